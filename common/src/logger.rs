// Binary-side log sink installation. Library code never touches this module;
// it only ever calls through the `log` facade.

use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// Installs a colored, timestamped `fern` logger writing to stdout.
///
/// Mirrors this codebase's convention of keeping log sink setup in the
/// binary entry point rather than in library crates.
pub fn init(level: LevelFilter) -> Result<(), fern::InitError> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}] [{}] [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;

    Ok(())
}
