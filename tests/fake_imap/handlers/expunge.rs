//! EXPUNGE and shared expunge logic.
//!
//! Permanently removes all messages with the `\Deleted` flag from the
//! selected folder. EXPUNGE reports `* N EXPUNGE` for each removed
//! message (N is the sequence number at the time of removal); CLOSE
//! removes them silently.

use crate::fake_imap::account::Account;
use crate::fake_imap::io::write_line;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Remove `\Deleted` messages from `folder_name`. Returns the sequence
/// numbers to report, or `None` if the folder does not exist.
pub fn remove_deleted(account: &Mutex<Account>, folder_name: &str) -> Option<Vec<usize>> {
    let mut account = account.lock().unwrap();
    let folder = account.get_folder_mut(folder_name)?;

    let deleted: Vec<usize> = folder
        .emails
        .iter()
        .enumerate()
        .filter(|(_, e)| e.has_flag("\\Deleted"))
        .map(|(i, _)| i)
        .collect();

    // Each removal shifts later sequence numbers down by one.
    let seqs = deleted
        .iter()
        .enumerate()
        .map(|(offset, idx)| idx + 1 - offset)
        .collect();
    for idx in deleted.iter().rev() {
        folder.emails.remove(*idx);
    }
    Some(seqs)
}

/// Handle the EXPUNGE command.
pub async fn handle_expunge<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    account: &Mutex<Account>,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let Some(seqs) = remove_deleted(account, folder_name) else {
        let resp = format!("{tag} BAD Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    for seq in &seqs {
        let line = format!("* {seq} EXPUNGE\r\n");
        if write_line(stream, &line).await.is_err() {
            return;
        }
    }
    let resp = format!("{tag} OK EXPUNGE completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::account::{AccountBuilder, TestEmail};
    use crate::fake_imap::io::capture;

    fn account() -> Mutex<Account> {
        Mutex::new(
            AccountBuilder::new()
                .folder("INBOX")
                .email(TestEmail::new(1).deleted())
                .email(TestEmail::new(2))
                .email(TestEmail::new(3).deleted())
                .build(),
        )
    }

    #[tokio::test]
    async fn removes_deleted_and_reports_shifted_sequences() {
        let account = account();
        let output = capture(|mut s| {
            let account = &account;
            async move { handle_expunge("A1", account, Some("INBOX"), &mut s).await }
        })
        .await;

        assert!(output.contains("* 1 EXPUNGE\r\n* 2 EXPUNGE\r\n"));
        assert!(output.ends_with("A1 OK EXPUNGE completed\r\n"));

        let uids: Vec<u32> = account.lock().unwrap().folders[0]
            .emails
            .iter()
            .map(|e| e.uid)
            .collect();
        assert_eq!(uids, vec![2]);
    }

    #[tokio::test]
    async fn no_folder_selected_returns_bad() {
        let account = account();
        let output = capture(|mut s| {
            let account = &account;
            async move { handle_expunge("A1", account, None, &mut s).await }
        })
        .await;
        assert!(output.contains("A1 BAD No folder selected"));
    }
}
