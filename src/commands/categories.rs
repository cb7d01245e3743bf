// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::CategoryType;
use crate::store::SqliteLedger;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let store = SqliteLedger::new(conn);
    match m.subcommand() {
        Some(("add", sub)) => {
            let user = sub.get_one::<String>("user").unwrap();
            let name = sub.get_one::<String>("name").unwrap().trim();
            let color = sub.get_one::<String>("color").unwrap().trim();
            let kind = sub.get_one::<String>("type").unwrap().parse::<CategoryType>()?;
            store.create_category(user, name, color, kind)?;
            println!("Added category '{}'", name);
        }
        Some(("list", sub)) => {
            let user = sub.get_one::<String>("user").unwrap();
            let cats = store.list_categories(user)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &cats)? {
                let data = cats
                    .iter()
                    .map(|c| vec![c.name.clone(), c.r#type.as_str().to_string(), c.color.clone()])
                    .collect();
                println!("{}", pretty_table(&["Category", "Type", "Color"], data));
            }
        }
        Some(("rm", sub)) => {
            let user = sub.get_one::<String>("user").unwrap();
            let name = sub.get_one::<String>("name").unwrap().trim();
            store.remove_category(user, name)?;
            println!("Removed category '{}'", name);
        }
        _ => {}
    }
    Ok(())
}
