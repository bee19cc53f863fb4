//! CAPABILITY command handler.
//!
//! A plain account advertises no SORT, THREAD or UNSELECT, so every
//! ordering beyond plain SEARCH is finished client-side and folders are
//! left with CLOSE. Extensions named on the account are appended.

use crate::fake_imap::account::Account;
use crate::fake_imap::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle the CAPABILITY command.
pub async fn handle_capability<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    account: &Account,
    stream: &mut BufReader<S>,
) {
    let mut line = "* CAPABILITY IMAP4rev1 STARTTLS".to_string();
    for capability in &account.capabilities {
        line.push(' ');
        line.push_str(capability);
    }
    line.push_str("\r\n");
    let _ = write_line(stream, &line).await;
    let resp = format!("{tag} OK CAPABILITY completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::account::AccountBuilder;
    use crate::fake_imap::io::capture;

    async fn run(account: &Account) -> String {
        capture(|mut s| async move { handle_capability("A1", account, &mut s).await }).await
    }

    #[tokio::test]
    async fn sends_capability_list() {
        let output = run(&AccountBuilder::new().folder("INBOX").build()).await;
        assert!(output.contains("* CAPABILITY IMAP4rev1 STARTTLS\r\n"));
        assert!(!output.contains("SORT"));
        assert!(output.contains("A1 OK CAPABILITY completed"));
    }

    #[tokio::test]
    async fn advertises_account_extensions() {
        let account = AccountBuilder::new()
            .folder("INBOX")
            .capability("SORT")
            .capability("UNSELECT")
            .build();
        let output = run(&account).await;
        assert!(output.contains("* CAPABILITY IMAP4rev1 STARTTLS SORT UNSELECT\r\n"));
    }
}
