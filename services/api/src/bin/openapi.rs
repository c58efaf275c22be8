//! services/api/src/bin/openapi.rs
//!
//! Prints the OpenAPI document of the vocabulary reader's REST surface.
//! `openapi [PATH]` writes it to PATH (default `openapi.json`); `openapi -`
//! writes it to stdout so it can be piped into client generators.

use std::io::Write;

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_PATH: &str = "openapi.json";

/// Where the document goes.
#[derive(Debug, PartialEq)]
enum Target {
    Stdout,
    File(String),
}

impl Target {
    fn from_arg(arg: Option<String>) -> Self {
        match arg.as_deref() {
            Some("-") => Target::Stdout,
            Some(path) => Target::File(path.to_string()),
            None => Target::File(DEFAULT_PATH.to_string()),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let document = ApiDoc::openapi().to_pretty_json()?;
    match Target::from_arg(std::env::args().nth(1)) {
        Target::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(document.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
        Target::File(path) => {
            std::fs::write(&path, document)?;
            eprintln!("OpenAPI document written to {}", path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_means_stdout_and_no_argument_means_the_default_file() {
        assert_eq!(Target::from_arg(Some("-".into())), Target::Stdout);
        assert_eq!(Target::from_arg(None), Target::File(DEFAULT_PATH.into()));
        assert_eq!(
            Target::from_arg(Some("docs/api.json".into())),
            Target::File("docs/api.json".into())
        );
    }

    #[test]
    fn document_lists_the_reader_routes() {
        let document = ApiDoc::openapi();
        for path in ["/health", "/articles", "/lookup/{word}", "/unfamiliar-words"] {
            assert!(document.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
