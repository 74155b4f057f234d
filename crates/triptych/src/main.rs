fn main() -> anyhow::Result<()> {
    triptych::init();

    triptych::ui::cli::run()
}
