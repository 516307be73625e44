fn main() -> anyhow::Result<()> {
    devfocus_lib::run()
}
