// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{value_parser, Arg, ArgAction, Command};

fn user_arg() -> Arg {
    Arg::new("user")
        .long("user")
        .short('u')
        .required(true)
        .help("Owning user id")
}

fn json_args() -> [Arg; 2] {
    [
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print one JSON object per line"),
    ]
}

fn today_arg() -> Arg {
    Arg::new("today")
        .long("today")
        .help("Reference date YYYY-MM-DD (defaults to the local date)")
}

pub fn build_cli() -> Command {
    Command::new("spendline")
        .version(clap::crate_version!())
        .about("Personal finance ledger with recurring and amortized transactions")
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .env("SPENDLINE_DB")
                .help("Path to the SQLite database"),
        )
        .subcommand(Command::new("init").about("Create the database if missing"))
        .subcommand(
            Command::new("user")
                .about("Manage users and their billing month")
                .subcommand(
                    Command::new("add")
                        .arg(user_arg())
                        .arg(Arg::new("name").long("name"))
                        .arg(
                            Arg::new("month-start-day")
                                .long("month-start-day")
                                .value_parser(value_parser!(u32))
                                .default_value("1"),
                        ),
                )
                .subcommand(
                    Command::new("set-month-start").arg(user_arg()).arg(
                        Arg::new("day")
                            .long("day")
                            .required(true)
                            .value_parser(value_parser!(u32)),
                    ),
                ),
        )
        .subcommand(
            Command::new("category")
                .about("Manage categories")
                .subcommand(
                    Command::new("add")
                        .arg(user_arg())
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("color").long("color").default_value("#808080"))
                        .arg(Arg::new("type").long("type").default_value("optional")),
                )
                .subcommand(Command::new("list").arg(user_arg()).args(json_args()))
                .subcommand(
                    Command::new("rm")
                        .arg(user_arg())
                        .arg(Arg::new("name").long("name").required(true)),
                ),
        )
        .subcommand(
            Command::new("tx")
                .about("Record and edit transactions")
                .subcommand(
                    Command::new("add")
                        .arg(user_arg())
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("type").long("type").default_value("expense"))
                        .arg(Arg::new("date").long("date").required(true))
                        .arg(Arg::new("category").long("category"))
                        .arg(Arg::new("description").long("description"))
                        .arg(
                            Arg::new("recurring")
                                .long("recurring")
                                .help("daily | weekly | monthly | yearly"),
                        )
                        .arg(
                            Arg::new("amortize")
                                .long("amortize")
                                .value_parser(value_parser!(u32))
                                .help("Split into this many monthly installments"),
                        ),
                )
                .subcommand(
                    Command::new("list")
                        .arg(user_arg())
                        .arg(Arg::new("from").long("from"))
                        .arg(Arg::new("to").long("to"))
                        .arg(
                            Arg::new("month")
                                .long("month")
                                .conflicts_with_all(["from", "to"])
                                .help("YYYY-MM"),
                        )
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        )
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("show")
                        .arg(user_arg())
                        .arg(Arg::new("id").long("id").required(true))
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("update")
                        .arg(user_arg())
                        .arg(Arg::new("id").long("id").required(true))
                        .arg(Arg::new("amount").long("amount"))
                        .arg(Arg::new("type").long("type"))
                        .arg(Arg::new("date").long("date"))
                        .arg(Arg::new("category").long("category"))
                        .arg(Arg::new("description").long("description"))
                        .arg(Arg::new("recurring").long("recurring"))
                        .arg(
                            Arg::new("no-recurring")
                                .long("no-recurring")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("recurring"),
                        )
                        .arg(
                            Arg::new("amortize")
                                .long("amortize")
                                .value_parser(value_parser!(u32)),
                        )
                        .arg(
                            Arg::new("no-amortize")
                                .long("no-amortize")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("amortize"),
                        ),
                )
                .subcommand(
                    Command::new("rm")
                        .arg(user_arg())
                        .arg(Arg::new("id").long("id").required(true)),
                ),
        )
        .subcommand(
            Command::new("reconcile")
                .about("Run all reconciliation sweeps once")
                .arg(today_arg())
                .args(json_args()),
        )
        .subcommand(
            Command::new("watch")
                .about("Reconcile now, then daily at midnight (monthly sweeps on the 1st)"),
        )
        .subcommand(
            Command::new("report").about("Summaries").subcommand(
                Command::new("monthly")
                    .arg(user_arg())
                    .arg(Arg::new("month").long("month").required(true).help("YYYY-MM"))
                    .args(json_args()),
            ),
        )
}
