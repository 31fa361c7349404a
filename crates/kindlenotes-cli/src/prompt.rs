//! Interactive credential entry
//!
//! Asks for the email on the terminal and reads the password without
//! echoing it. Prompts go to stderr so stdout stays clean for the JSON.

use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};

use kindlenotes_core::Credentials;

/// Prompt until a non-blank email/password pair is entered
pub fn credentials() -> Result<Credentials> {
    if !atty::is(atty::Stream::Stdin) {
        bail!("No credentials file given and stdin is not a terminal. Use --cred-file.");
    }

    let stdin = io::stdin();
    read_credentials(&mut stdin.lock(), &mut io::stderr(), || {
        rpassword::prompt_password("Password: ")
    })
}

/// Prompt loop over arbitrary input/output, for testing
fn read_credentials<R, W, P>(input: &mut R, output: &mut W, mut password: P) -> Result<Credentials>
where
    R: BufRead,
    W: Write,
    P: FnMut() -> io::Result<String>,
{
    loop {
        write!(output, "Email: ")?;
        output.flush()?;

        let mut email = String::new();
        if input.read_line(&mut email)? == 0 {
            bail!("No email entered");
        }

        match Credentials::new(email.trim(), password()?) {
            Ok(credentials) => return Ok(credentials),
            Err(_) => writeln!(output, "Invalid email/password; try again")?,
        }
    }
}
