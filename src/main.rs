use anyhow::Result;
use tagc::cli::App;

fn main() -> Result<()> {
    let (mut app, args) = App::from_args()?;

    app.run(args)?;

    Ok(())
}
