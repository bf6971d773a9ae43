use std::io::{self, Write};
use std::sync::Mutex;

#[cfg(feature = "dev")]
use std::{fs::File, path::Path};

use log::Log;

/// Writes every record as one prefixed line. The mutex keeps concurrent
/// records whole; contention is no concern at shell log volumes.
pub struct SimpleLogger<W> {
    sink: Mutex<W>,
    prefix: &'static str,
}

impl<W: Write + Send> SimpleLogger<W> {
    fn new(sink: W, prefix: &'static str) -> Self {
        Self {
            sink: Mutex::new(sink),
            prefix,
        }
    }
}

impl SimpleLogger<io::Stderr> {
    pub fn to_stderr(prefix: &'static str) -> Self {
        Self::new(io::stderr(), prefix)
    }
}

#[cfg(feature = "dev")]
impl SimpleLogger<File> {
    pub fn to_file<P: AsRef<Path>>(name: P, prefix: &'static str) -> io::Result<Self> {
        let sink = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(name)?;
        Ok(Self::new(sink, prefix))
    }
}

impl<W: Write + Send> Log for SimpleLogger<W> {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{}{}", self.prefix, record.args());
        }
    }

    fn flush(&self) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = sink.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use log::{Level, LevelFilter, Log, Record};

    use super::SimpleLogger;

    #[test]
    fn records_come_out_as_prefixed_lines() {
        let logger = SimpleLogger::new(Vec::new(), "tinyshell: ");

        logger.log(
            &Record::builder()
                .args(format_args!("cannot open input file"))
                .level(Level::Error)
                .build(),
        );
        logger.log(
            &Record::builder()
                .args(format_args!("fg: %7: no such job"))
                .level(Level::Warn)
                .build(),
        );

        let sink = logger.sink.lock().unwrap();
        assert_eq!(
            String::from_utf8(sink.clone()).unwrap(),
            "tinyshell: cannot open input file\ntinyshell: fg: %7: no such job\n"
        );
    }

    // The one test that moves the global level; a second one could race it.
    #[test]
    fn level_filtering_follows_the_global_maximum() {
        let logger = SimpleLogger::new(Vec::<u8>::new(), "");
        let trace = log::Metadata::builder().level(Level::Trace).build();

        log::set_max_level(LevelFilter::Trace);
        assert!(logger.enabled(&trace));

        log::set_max_level(LevelFilter::Info);
        assert!(!logger.enabled(&trace));
    }
}
