/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::process::ExitCode;

use clap::Parser;
use quickmail::{
    config::{Args, Config},
    session::SessionBootstrapper,
    terminal::{report, Console},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();

    let config = match Config::from_args(Args::parse()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let capabilities = config.capabilities;
    let mut console = Console::default();

    let session = match SessionBootstrapper::new(config)
        .bootstrap(&mut console)
        .await
    {
        Ok(session) => session,
        Err(quickmail::Error::ConnectionFailed(err)) => {
            report(
                &mut console,
                &format!(">>> Couldn't make SMTP connection. Here's the error:\n{err}"),
            );
            return ExitCode::FAILURE;
        }
        Err(err) => {
            log::debug!("Session setup aborted: {err:?}");
            report(&mut console, &format!(">>> {err}"));
            return ExitCode::FAILURE;
        }
    };

    match session.run(&mut console, capabilities).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::debug!("Exiting after error: {err:?}");
            report(&mut console, &format!(">>> {err}"));
            ExitCode::FAILURE
        }
    }
}
