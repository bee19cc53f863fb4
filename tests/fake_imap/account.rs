//! Test data model for the fake IMAP server
//!
//! Provides a builder-style API for constructing account state:
//!
//! ```ignore
//! let account = AccountBuilder::new()
//!     .folder("INBOX")
//!         .email(TestEmail::new(1).subject("Hello").seen())
//!     .folder("INBOX.Work.2024")
//!     .folder("Sent").attribute("\\Sent")
//!     .folder("Old").unsubscribed()
//!     .capability("SORT")
//!     .build();
//! ```
//!
//! The server uses `.` as its hierarchy delimiter, like Dovecot and
//! Courier do. Extensions are off unless the account names them with
//! `.capability(..)`.

/// Hierarchy delimiter the fake server reports.
pub const DELIMITER: &str = ".";

/// All folders of one test account.
#[derive(Debug, Clone, Default)]
pub struct Account {
    pub folders: Vec<Folder>,
    /// Extensions advertised beyond `IMAP4rev1 STARTTLS`.
    pub capabilities: Vec<String>,
}

impl Account {
    /// Look up a folder by name (case-sensitive, matching real IMAP).
    pub fn get_folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }

    pub fn get_folder_mut(&mut self, name: &str) -> Option<&mut Folder> {
        self.folders.iter_mut().find(|f| f.name == name)
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
    }
}

/// A single IMAP folder.
#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    pub subscribed: bool,
    /// LIST attributes such as `\Noselect` or `\Sent`.
    pub attributes: Vec<String>,
    pub emails: Vec<TestEmail>,
}

impl Folder {
    pub fn no_select(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case("\\Noselect"))
    }

    /// Number of messages without `\Seen`.
    pub fn unseen(&self) -> usize {
        self.emails.iter().filter(|e| !e.has_flag("\\Seen")).count()
    }

    pub fn uid_next(&self) -> u32 {
        self.emails
            .iter()
            .map(|e| e.uid)
            .max()
            .map_or(1, |max| max + 1)
    }
}

/// An address as `(display name, mailbox@host)`.
pub type TestAddress = (Option<String>, String);

/// A test message. The fake server answers ENVELOPE, FLAGS,
/// RFC822.SIZE and INTERNALDATE from the fields, and BODY[] from
/// `raw` or a source assembled from them.
#[derive(Debug, Clone)]
pub struct TestEmail {
    pub uid: u32,
    pub flags: Vec<String>,
    pub from: Vec<TestAddress>,
    pub to: Vec<TestAddress>,
    pub subject: Option<String>,
    /// RFC 2822 `Date:` value.
    pub date: Option<String>,
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub size: u32,
    /// Full RFC 2822 source, if the test supplied one.
    pub raw: Option<String>,
}

impl TestEmail {
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            flags: Vec::new(),
            from: Vec::new(),
            to: Vec::new(),
            subject: None,
            date: None,
            message_id: Some(format!("<{uid}@fake.test>")),
            in_reply_to: None,
            size: 1024,
            raw: None,
        }
    }

    pub fn from(mut self, name: &str, email: &str) -> Self {
        self.from.push((Some(name.to_string()), email.to_string()));
        self
    }

    pub fn to(mut self, email: &str) -> Self {
        self.to.push((None, email.to_string()));
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }

    /// Make this message a reply to the message with UID `parent`.
    pub fn reply_to(mut self, parent: u32) -> Self {
        self.in_reply_to = Some(format!("<{parent}@fake.test>"));
        self
    }

    pub const fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn flag(mut self, flag: &str) -> Self {
        self.flags.push(flag.to_string());
        self
    }

    pub fn seen(self) -> Self {
        self.flag("\\Seen")
    }

    pub fn deleted(self) -> Self {
        self.flag("\\Deleted")
    }

    pub fn raw(mut self, source: &str) -> Self {
        self.raw = Some(source.to_string());
        self
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }

    /// The message source: `raw`, or headers built from the fields and
    /// a one-line body.
    pub fn source(&self) -> String {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let address = |(name, email): &TestAddress| match name {
            Some(name) => format!("{name} <{email}>"),
            None => email.clone(),
        };
        let mut source = String::new();
        let mut header = |name: &str, value: Option<String>| {
            if let Some(value) = value {
                source.push_str(&format!("{name}: {value}\r\n"));
            }
        };
        let join = |list: &[TestAddress]| {
            (!list.is_empty()).then(|| list.iter().map(address).collect::<Vec<_>>().join(", "))
        };
        header("From", join(&self.from));
        header("To", join(&self.to));
        header("Subject", self.subject.clone());
        header("Date", self.date.clone());
        header("Message-ID", self.message_id.clone());
        header("In-Reply-To", self.in_reply_to.clone());
        source.push_str(&format!("\r\nBody of message {}.\r\n", self.uid));
        source
    }

    /// Header block of `source()`, up to and including the blank line.
    pub fn header(&self) -> String {
        let source = self.source();
        match source.find("\r\n\r\n") {
            Some(end) => source[..end + 4].to_string(),
            None => source,
        }
    }
}

/// Builder for constructing an `Account` step by step.
///
/// Call `.folder(name)` to start a new folder, then chain
/// `.email(..)`, `.attribute(..)` or `.unsubscribed()` calls to shape
/// it. Finish with `.build()`.
pub struct AccountBuilder {
    folders: Vec<Folder>,
    capabilities: Vec<String>,
}

impl AccountBuilder {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
            capabilities: Vec::new(),
        }
    }

    /// Advertise an extension such as `SORT` or `UNSELECT` and answer
    /// its commands.
    pub fn capability(mut self, name: &str) -> Self {
        self.capabilities.push(name.to_string());
        self
    }

    /// Add a new folder. Subsequent calls shape this folder.
    pub fn folder(mut self, name: &str) -> Self {
        self.folders.push(Folder {
            name: name.to_string(),
            subscribed: true,
            attributes: Vec::new(),
            emails: Vec::new(),
        });
        self
    }

    fn current(&mut self) -> &mut Folder {
        self.folders
            .last_mut()
            .expect("call .folder() before shaping it")
    }

    /// Add a LIST attribute to the most recently added folder.
    pub fn attribute(mut self, attribute: &str) -> Self {
        self.current().attributes.push(attribute.to_string());
        self
    }

    /// Leave the most recently added folder out of LSUB.
    pub fn unsubscribed(mut self) -> Self {
        self.current().subscribed = false;
        self
    }

    /// Add an email to the most recently added folder.
    pub fn email(mut self, email: TestEmail) -> Self {
        self.current().emails.push(email);
        self
    }

    pub fn build(self) -> Account {
        Account {
            folders: self.folders,
            capabilities: self.capabilities,
        }
    }
}
