use clap::{Arg, Command};

use crate::nf_type::{GNB_STR, UE_STR};

fn get_nf_subcommand(nf_name: &'static str) -> Command {
	let nf_about = format!("Runs the {nf_name} network function");
	Command::new(nf_name).about(nf_about).arg(
		Arg::new("config")
			.help("Configuration file to use")
			.required(true)
			.value_name("CONFIG_FILE")
			.long("config")
			.short('c'),
	)
}

pub fn get_clap_app(name: &'static str, about: &'static str, author: &'static str, version: &'static str) -> Command {
	Command::new(name)
		.version(version)
		.author(author)
		.about(about)
		.subcommand_required(true)
		.arg_required_else_help(true)
		.subcommand(get_nf_subcommand(GNB_STR))
		.subcommand(get_nf_subcommand(UE_STR))
}
