use pyshell_channel::ChannelOptions;

use crate::cmd::session::drive;
use crate::cmd::RunArgs;
use crate::exit::CliResult;
use crate::output::OutputFormat;

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let options = args.interpreter.options()?.merge(&ChannelOptions {
        args: Some(args.args),
        ..ChannelOptions::default()
    });
    drive(args.script, options, args.send, format)
}
