// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::User;
use crate::store::SqliteLedger;
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let store = SqliteLedger::new(conn);
    match m.subcommand() {
        Some(("add", sub)) => {
            let user = User {
                id: sub.get_one::<String>("user").unwrap().trim().to_string(),
                username: sub.get_one::<String>("name").cloned(),
                month_start_day: *sub.get_one::<u32>("month-start-day").unwrap(),
            };
            store.upsert_user(&user)?;
            println!(
                "Saved user '{}' (month starts on day {})",
                user.id, user.month_start_day
            );
        }
        Some(("set-month-start", sub)) => {
            let user = sub.get_one::<String>("user").unwrap().trim();
            let day = *sub.get_one::<u32>("day").unwrap();
            store.set_month_start_day(user, day)?;
            println!("Month for '{}' now starts on day {}", user, day);
        }
        _ => {}
    }
    Ok(())
}
