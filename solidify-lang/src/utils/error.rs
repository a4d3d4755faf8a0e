use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};

use super::metadata::Location;

pub trait ReportableError: std::error::Error {
    /// message is used for reporting verbose message for ariadne.
    fn get_message(&self) -> String {
        self.to_string()
    }
    /// label is used for indicating error with the specific position for ariadne.
    fn get_labels(&self) -> Vec<(Location, String)>;
}

struct FileCache {
    src: ariadne::Source<String>,
}

impl ariadne::Cache<String> for FileCache {
    type Storage = String;

    fn fetch(
        &mut self,
        _id: &String,
    ) -> Result<&Source<Self::Storage>, Box<dyn std::fmt::Debug + '_>> {
        Ok(&self.src)
    }

    fn display<'a>(&self, id: &'a String) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(id.clone()))
    }
}

pub fn report(src: &str, path: &str, errs: &[Box<dyn ReportableError>]) {
    let mut colors = ColorGenerator::new();
    for e in errs {
        let rawlabels = e.get_labels();
        let offset = rawlabels.first().map_or(0, |(loc, _)| loc.span.start);
        let labels = rawlabels.iter().map(|(loc, message)| {
            Label::new(loc.clone())
                .with_message(message)
                .with_color(colors.next())
        });
        let builder = Report::build(ReportKind::Error, path.to_string(), offset)
            .with_message(e.get_message())
            .with_labels(labels)
            .finish();
        let res = builder.eprint(FileCache {
            src: ariadne::Source::from(src.to_string()),
        });
        if let Err(ioerr) = res {
            log::error!("failed to print report: {ioerr}");
        }
    }
}

pub fn dump_to_string(errs: &[Box<dyn ReportableError>]) -> String {
    let mut res = String::new();
    for e in errs {
        res += e.get_message().as_str();
        res.push('\n');
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::snapshot::RootError;

    #[test]
    fn messages_are_joined_by_line() {
        let errs: Vec<Box<dyn ReportableError>> = vec![
            Box::new(RootError::NoRoot),
            Box::new(RootError::UnknownItem("x".into())),
        ];
        assert_eq!(
            dump_to_string(&errs),
            "snapshot has no closure, class or module to solidify\nno item named 'x' to solidify\n"
        );
    }
}
