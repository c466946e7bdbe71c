fn main() -> anyhow::Result<()> {
    astrodash_lib::run()
}
