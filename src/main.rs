fn main() -> anyhow::Result<()> {
    timeline_tui::cli::run()
}
