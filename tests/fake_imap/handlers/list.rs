//! LIST and LSUB command handler.
//!
//! Responds with one untagged line per matching folder, followed by the
//! tagged OK. The format follows RFC 3501 Section 7.2.2:
//!
//! ```text
//! * LIST (\HasNoChildren) "." "INBOX"
//! * LIST (\Noselect \HasChildren) "." "Lists"
//! A0002 OK LIST completed
//! ```
//!
//! In the pattern, `*` matches anything and `%` matches anything but
//! the hierarchy delimiter. LSUB only reports subscribed folders.

use crate::fake_imap::account::{Account, DELIMITER};
use crate::fake_imap::io::{nstring, write_line};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle LIST (or LSUB when `subscribed_only`).
pub async fn handle_list<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    pattern: &str,
    subscribed_only: bool,
    account: &Account,
    stream: &mut BufReader<S>,
) {
    let command = if subscribed_only { "LSUB" } else { "LIST" };

    for folder in &account.folders {
        if (subscribed_only && !folder.subscribed) || !matches(pattern, &folder.name) {
            continue;
        }
        let has_children = account
            .folders
            .iter()
            .any(|f| f.name.starts_with(&format!("{}{DELIMITER}", folder.name)));
        let mut attributes = folder.attributes.clone();
        attributes.push(
            if has_children {
                "\\HasChildren"
            } else {
                "\\HasNoChildren"
            }
            .to_string(),
        );

        let line = format!(
            "* {command} ({}) {} {}\r\n",
            attributes.join(" "),
            nstring(Some(DELIMITER)),
            nstring(Some(&folder.name))
        );
        if write_line(stream, &line).await.is_err() {
            return;
        }
    }
    let resp = format!("{tag} OK {command} completed\r\n");
    let _ = write_line(stream, &resp).await;
}

/// IMAP list-wildcard match.
fn matches(pattern: &str, name: &str) -> bool {
    match pattern.chars().next() {
        None => name.is_empty(),
        Some('*') => (0..=name.len())
            .filter(|i| name.is_char_boundary(*i))
            .any(|i| matches(&pattern[1..], &name[i..])),
        Some('%') => (0..=name.len())
            .filter(|i| name.is_char_boundary(*i))
            .take_while(|i| !name[..*i].contains(DELIMITER))
            .any(|i| matches(&pattern[1..], &name[i..])),
        Some(c) => name
            .strip_prefix(c)
            .is_some_and(|rest| matches(&pattern[c.len_utf8()..], rest)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::account::AccountBuilder;
    use crate::fake_imap::io::capture;

    fn account() -> Account {
        AccountBuilder::new()
            .folder("INBOX")
            .folder("INBOX.Work")
            .folder("Sent")
            .attribute("\\Sent")
            .folder("Old")
            .unsubscribed()
            .build()
    }

    async fn run(pattern: &str, subscribed_only: bool) -> String {
        let account = account();
        capture(|mut s| async move {
            handle_list("A1", pattern, subscribed_only, &account, &mut s).await;
        })
        .await
    }

    #[tokio::test]
    async fn lists_all_folders() {
        let output = run("*", false).await;
        assert!(output.contains("* LIST (\\HasChildren) \".\" \"INBOX\""));
        assert!(output.contains("\"INBOX.Work\""));
        assert!(output.contains("* LIST (\\Sent \\HasNoChildren) \".\" \"Sent\""));
        assert!(output.contains("\"Old\""));
        assert!(output.ends_with("A1 OK LIST completed\r\n"));
    }

    #[tokio::test]
    async fn lsub_skips_unsubscribed() {
        let output = run("*", true).await;
        assert!(output.contains("* LSUB"));
        assert!(!output.contains("\"Old\""));
        assert!(output.ends_with("A1 OK LSUB completed\r\n"));
    }

    #[tokio::test]
    async fn exact_pattern_lists_one_folder() {
        let output = run("Sent", false).await;
        assert_eq!(output.matches("* LIST").count(), 1);
        assert!(output.contains("\"Sent\""));
    }

    #[test]
    fn wildcards() {
        assert!(matches("*", "INBOX.Work"));
        assert!(matches("INBOX.*", "INBOX.Work"));
        assert!(matches("%", "INBOX"));
        assert!(!matches("%", "INBOX.Work"));
        assert!(!matches("Sent", "Sent.Old"));
    }
}
