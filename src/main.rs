fn main() -> anyhow::Result<()> {
    recall::run()
}
