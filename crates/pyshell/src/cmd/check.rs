use pyshell_channel::{check_syntax, check_syntax_file, SyntaxCheckError};
use serde::Serialize;

use crate::cmd::session::runtime;
use crate::cmd::CheckArgs;
use crate::exit::{syntax_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct CheckOutput<'a> {
    source: &'a str,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
}

pub fn run(args: CheckArgs, format: OutputFormat) -> CliResult<i32> {
    let options = args.interpreter.options()?;
    let (source, result) = runtime()?.block_on(async move {
        match args.file {
            Some(path) => {
                let result = check_syntax_file(&path, options).await;
                (path.display().to_string(), result)
            }
            None => {
                let code = args.code.unwrap_or_default();
                ("<string>".to_string(), check_syntax(code, options).await)
            }
        }
    });

    let summary = match &result {
        Err(SyntaxCheckError::Invalid { summary, .. }) => Some(summary.as_str()),
        _ => None,
    };
    if matches!(result, Ok(()) | Err(SyntaxCheckError::Invalid { .. })) {
        let record = CheckOutput {
            source: &source,
            valid: result.is_ok(),
            summary,
        };
        let mut fields = vec![
            ("source", source.clone()),
            ("valid", record.valid.to_string()),
        ];
        if let Some(summary) = summary {
            fields.push(("summary", summary.to_string()));
        }
        print_record(&record, &fields, format);
    }

    match result {
        Ok(()) => Ok(SUCCESS),
        Err(err) => Err(syntax_error("check failed", err)),
    }
}
