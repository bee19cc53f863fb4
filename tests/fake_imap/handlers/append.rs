//! APPEND command handler.
//!
//! APPEND carries its message as a synchronizing literal, which the
//! line-based command loop cannot hand to the codec. The session spots
//! it with [`parse_append`] and lets [`handle_append`] run the
//! continuation:
//!
//! ```text
//! C: A0008 APPEND "INBOX" (\Seen) {23}
//! S: + Ready for literal data
//! C: Subject: hi<CRLF><CRLF>body<CRLF>
//! S: A0008 OK APPEND completed
//! ```
//!
//! The new message takes the folder's next UID, and its subject, date
//! and message id are read back from the header.

use crate::fake_imap::account::{Account, TestEmail};
use crate::fake_imap::io::write_line;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};

/// An APPEND command line, up to its literal.
#[derive(Debug, PartialEq, Eq)]
pub struct AppendRequest {
    pub tag: String,
    pub mailbox: String,
    pub flags: Vec<String>,
    pub len: usize,
}

/// Recognize `<tag> APPEND <mailbox> [(<flags>)] [<date>] {<n>}`.
pub fn parse_append(line: &str) -> Option<AppendRequest> {
    let line = line.trim_end();
    let (tag, rest) = line.split_once(' ')?;
    let (verb, rest) = rest.split_once(' ')?;
    if !verb.eq_ignore_ascii_case("APPEND") {
        return None;
    }

    let open = rest.rfind('{')?;
    let len = rest[open + 1..]
        .strip_suffix('}')?
        .trim_end_matches('+')
        .parse()
        .ok()?;
    let rest = rest[..open].trim();

    let (mailbox, rest) = if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        (quoted[..end].to_string(), &quoted[end + 1..])
    } else {
        let end = rest.find(' ').unwrap_or(rest.len());
        (rest[..end].to_string(), &rest[end..])
    };

    let rest = rest.trim_start();
    let flags = match rest.strip_prefix('(') {
        Some(list) => list
            .split(')')
            .next()
            .unwrap_or("")
            .split_whitespace()
            .map(ToString::to_string)
            .collect(),
        None => Vec::new(),
    };

    Some(AppendRequest {
        tag: tag.to_string(),
        mailbox,
        flags,
        len,
    })
}

fn header_value(source: &str, name: &str) -> Option<String> {
    source
        .split("\r\n")
        .take_while(|line| !line.is_empty())
        .find_map(|line| {
            let (field, value) = line.split_once(':')?;
            field
                .trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
}

/// Store the appended message, or the reason for a `NO`.
fn store(account: &Mutex<Account>, request: &AppendRequest, source: String) -> Result<u32, &'static str> {
    let mut account = account.lock().unwrap();
    let Some(folder) = account.get_folder_mut(&request.mailbox) else {
        return Err("[TRYCREATE] Folder not found");
    };
    if folder.no_select() {
        return Err("Folder is not selectable");
    }

    let uid = folder.uid_next();
    let mut email = TestEmail::new(uid);
    email.flags.clone_from(&request.flags);
    email.subject = header_value(&source, "Subject");
    email.date = header_value(&source, "Date");
    email.message_id = header_value(&source, "Message-ID");
    email.in_reply_to = header_value(&source, "In-Reply-To");
    email.size = u32::try_from(request.len).unwrap_or(u32::MAX);
    email.raw = Some(source);
    folder.emails.push(email);
    Ok(uid)
}

/// Read the literal of `request` and add it to the account. Returns
/// `false` when the connection broke.
pub async fn handle_append<S: AsyncRead + AsyncWrite + Unpin>(
    request: &AppendRequest,
    account: &Mutex<Account>,
    stream: &mut BufReader<S>,
) -> bool {
    if write_line(stream, "+ Ready for literal data\r\n").await.is_err() {
        return false;
    }
    let mut literal = vec![0; request.len];
    if stream.read_exact(&mut literal).await.is_err() {
        return false;
    }
    let mut end = String::new();
    if stream.read_line(&mut end).await.is_err() {
        return false;
    }

    let tag = &request.tag;
    let resp = match store(account, request, String::from_utf8_lossy(&literal).into_owned()) {
        Ok(uid) => format!("{tag} OK [APPENDUID 1 {uid}] APPEND completed\r\n"),
        Err(reason) => format!("{tag} NO {reason}\r\n"),
    };
    write_line(stream, &resp).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::account::AccountBuilder;
    use tokio::io::AsyncWriteExt;

    const MESSAGE: &str = "Subject: Hi there\r\nDate: Mon, 01 Jan 2024 10:00:00 +0000\r\n\r\nbody\r\n";

    fn request(mailbox: &str, flags: &[&str]) -> AppendRequest {
        AppendRequest {
            tag: "A1".to_string(),
            mailbox: mailbox.to_string(),
            flags: flags.iter().map(ToString::to_string).collect(),
            len: MESSAGE.len(),
        }
    }

    async fn run(request: &AppendRequest, account: &Mutex<Account>) -> String {
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        client.write_all(MESSAGE.as_bytes()).await.unwrap();
        client.write_all(b"\r\n").await.unwrap();

        let mut server = BufReader::new(server);
        handle_append(request, account, &mut server).await;
        drop(server);

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        output
    }

    #[test]
    fn parses_quoted_mailbox_and_flags() {
        let parsed = parse_append("A0008 APPEND \"INBOX\" (\\Seen $Work) {23}\r\n").unwrap();
        assert_eq!(parsed, AppendRequest {
            tag: "A0008".to_string(),
            mailbox: "INBOX".to_string(),
            flags: vec!["\\Seen".to_string(), "$Work".to_string()],
            len: 23,
        });
    }

    #[test]
    fn parses_bare_mailbox_without_flags() {
        let parsed = parse_append("a1 append Sent {5+}\r\n").unwrap();
        assert_eq!(parsed.mailbox, "Sent");
        assert!(parsed.flags.is_empty());
        assert_eq!(parsed.len, 5);
    }

    #[test]
    fn ignores_other_commands() {
        assert!(parse_append("A1 SELECT INBOX\r\n").is_none());
        assert!(parse_append("A1 APPEND INBOX\r\n").is_none());
    }

    #[tokio::test]
    async fn appends_with_next_uid() {
        let account = Mutex::new(
            AccountBuilder::new()
                .folder("INBOX")
                .email(TestEmail::new(7))
                .build(),
        );
        let output = run(&request("INBOX", &["\\Seen"]), &account).await;

        assert!(output.starts_with("+ Ready for literal data\r\n"));
        assert!(output.ends_with("A1 OK [APPENDUID 1 8] APPEND completed\r\n"));

        let account = account.lock().unwrap();
        let added = &account.folders[0].emails[1];
        assert_eq!(added.uid, 8);
        assert_eq!(added.subject.as_deref(), Some("Hi there"));
        assert_eq!(added.flags, vec!["\\Seen"]);
        assert_eq!(added.source(), MESSAGE);
    }

    #[tokio::test]
    async fn unknown_folder_is_refused() {
        let account = Mutex::new(AccountBuilder::new().folder("INBOX").build());
        let output = run(&request("Nope", &[]), &account).await;

        assert!(output.ends_with("A1 NO [TRYCREATE] Folder not found\r\n"));
        assert!(account.lock().unwrap().folders[0].emails.is_empty());
    }
}
