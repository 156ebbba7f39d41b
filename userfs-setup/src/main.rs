fn main() -> anyhow::Result<()> {
    userfs_setup::run()
}
