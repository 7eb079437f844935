use crate::foundation::{NodeError, Result};
use zeroize::Zeroizing;

/// Prints `prompt` and reads one line from stdin with terminal echo disabled where supported.
pub fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    #[cfg(target_family = "unix")]
    {
        prompt_hidden_unix(prompt)
    }
    #[cfg(not(target_family = "unix"))]
    {
        prompt_visible(prompt)
    }
}

#[cfg(not(target_family = "unix"))]
fn prompt_visible(prompt: &str) -> Result<Zeroizing<String>> {
    use std::io::{self, Write};

    print!("{prompt}");
    io::stdout().flush().map_err(|e| NodeError::Message(format!("failed to flush stdout: {e}")))?;
    read_line()
}

fn read_line() -> Result<Zeroizing<String>> {
    let mut input = Zeroizing::new(String::new());
    std::io::stdin().read_line(&mut input).map_err(|e| NodeError::Message(format!("failed to read password: {e}")))?;
    Ok(Zeroizing::new(input.trim_end_matches(['\r', '\n']).to_string()))
}

#[cfg(target_family = "unix")]
fn prompt_hidden_unix(prompt: &str) -> Result<Zeroizing<String>> {
    use libc::{tcgetattr, tcsetattr, ECHO, STDIN_FILENO, TCSANOW};
    use std::io::{self, Write};
    use std::mem::MaybeUninit;

    struct EchoGuard {
        original: libc::termios,
    }

    impl Drop for EchoGuard {
        fn drop(&mut self) {
            let rc = unsafe { tcsetattr(STDIN_FILENO, TCSANOW, &self.original) };
            if rc != 0 {
                log::warn!("failed to restore terminal echo after password prompt");
            }
        }
    }

    print!("{prompt}");
    io::stdout().flush().map_err(|e| NodeError::Message(format!("failed to flush stdout: {e}")))?;

    let mut termios = MaybeUninit::<libc::termios>::uninit();
    if unsafe { tcgetattr(STDIN_FILENO, termios.as_mut_ptr()) } != 0 {
        // Not a terminal (piped input).
        return read_line();
    }
    let original = unsafe { termios.assume_init() };
    let mut hidden = original;
    hidden.c_lflag &= !ECHO;
    if unsafe { tcsetattr(STDIN_FILENO, TCSANOW, &hidden) } != 0 {
        return read_line();
    }
    let _guard = EchoGuard { original };

    let input = read_line()?;
    println!();
    Ok(input)
}
