//! SELECT command handler.
//!
//! Opens a folder and responds with its metadata:
//!
//! - `* FLAGS (..)` -- flags defined in the folder.
//! - `* N EXISTS` / `* N RECENT` -- message counts.
//! - `* OK [UNSEEN n]` -- sequence number of the first unseen message.
//! - `* OK [UIDVALIDITY v]` / `* OK [UIDNEXT n]` -- UID bookkeeping.
//! - `* OK [PERMANENTFLAGS (..)]` -- flags that survive the session.
//!
//! Returns the selected folder name, or `None` if the folder is
//! unknown or `\Noselect`.

use crate::fake_imap::account::Account;
use crate::fake_imap::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle the SELECT command. Returns the selected folder name.
pub async fn handle_select<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    folder_name: &str,
    account: &Account,
    stream: &mut BufReader<S>,
) -> Option<String> {
    let Some(folder) = account.get_folder(folder_name).filter(|f| !f.no_select()) else {
        let resp = format!("{tag} NO Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return None;
    };

    let mut lines = vec![
        "* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft $Forwarded)\r\n".to_string(),
        format!("* {} EXISTS\r\n", folder.emails.len()),
        "* 0 RECENT\r\n".to_string(),
    ];
    if let Some(pos) = folder.emails.iter().position(|e| !e.has_flag("\\Seen")) {
        lines.push(format!("* OK [UNSEEN {}]\r\n", pos + 1));
    }
    lines.push("* OK [UIDVALIDITY 1]\r\n".to_string());
    lines.push(format!("* OK [UIDNEXT {}]\r\n", folder.uid_next()));
    lines.push("* OK [PERMANENTFLAGS (\\Seen \\Deleted \\*)] Limited\r\n".to_string());
    lines.push(format!("{tag} OK [READ-WRITE] SELECT completed\r\n"));

    for line in &lines {
        if write_line(stream, line).await.is_err() {
            return None;
        }
    }
    Some(folder_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::account::{AccountBuilder, TestEmail};
    use crate::fake_imap::io::capture;

    async fn run(folder_name: &str, account: Account) -> (String, Option<String>) {
        let mut selected = None;
        let output = capture(|mut s| {
            let selected = &mut selected;
            async move {
                *selected = handle_select("A1", folder_name, &account, &mut s).await;
            }
        })
        .await;
        (output, selected)
    }

    #[tokio::test]
    async fn selects_existing_folder() {
        let account = AccountBuilder::new()
            .folder("INBOX")
            .email(TestEmail::new(5).seen())
            .email(TestEmail::new(10))
            .build();

        let (output, selected) = run("INBOX", account).await;

        assert_eq!(selected.as_deref(), Some("INBOX"));
        assert!(output.contains("* 2 EXISTS"));
        assert!(output.contains("* OK [UNSEEN 2]"));
        assert!(output.contains("* OK [UIDNEXT 11]"));
        assert!(output.contains("A1 OK [READ-WRITE] SELECT completed"));
    }

    #[tokio::test]
    async fn refuses_missing_and_noselect_folders() {
        let account = AccountBuilder::new()
            .folder("Lists")
            .attribute("\\Noselect")
            .build();

        let (output, selected) = run("Lists", account.clone()).await;
        assert!(selected.is_none());
        assert!(output.contains("A1 NO"));

        let (_, selected) = run("Nope", account).await;
        assert!(selected.is_none());
    }
}
