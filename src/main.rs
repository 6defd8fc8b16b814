fn main() -> anyhow::Result<()> {
    tagnotes::cli::run()
}
