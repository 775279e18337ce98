use pyshell_channel::ChannelOptions;

use crate::cmd::session::drive;
use crate::cmd::ExecArgs;
use crate::exit::CliResult;
use crate::output::OutputFormat;

/// Inline code runs as `python [options] -c <code> [args..]`.
pub fn run(args: ExecArgs, format: OutputFormat) -> CliResult<i32> {
    let script_args = std::iter::once(args.code).chain(args.args).collect();
    let options = args.interpreter.options()?.merge(&ChannelOptions {
        args: Some(script_args),
        ..ChannelOptions::default()
    });
    drive("-c".to_string(), options, args.send, format)
}
