//! [`Transport`] over async-imap
//!
//! Connects with STARTTLS, then maps each transport operation onto one
//! IMAP command on the session.

use crate::capability::{Capabilities, INTERESTING};
use crate::config::ImapConfig;
use crate::error::{Error, Result};
use crate::flag::{ANY_KEYWORD, Flag};
use crate::folder::{FolderStatus, SpecialUse};
use crate::message::{Address, Envelope, MessageRecord};
use crate::transport::{
    FETCH_ITEMS, FolderDescriptor, OrderingRequest, RawSection, ResolvedOrdering, STATUS_ITEMS,
    SelectResponse, StoreMode, Transport, flag_list,
};
use async_imap::Session;
use async_imap::imap_proto::{MailboxDatum, Response};
use async_imap::types::{Fetch, Name, NameAttribute, UnsolicitedResponse};
use futures::{Stream, StreamExt};
use rustls::pki_types::ServerName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

/// A TLS-wrapped IMAP session.
pub type ImapSession = Session<Compat<tokio_rustls::client::TlsStream<TcpStream>>>;

/// An authenticated IMAP connection.
pub struct ImapTransport {
    session: ImapSession,
}

impl ImapTransport {
    /// Connect to `config.host:config.port`, issue STARTTLS, perform
    /// the TLS handshake and log in.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection, STARTTLS, the TLS
    /// handshake or LOGIN fails.
    pub async fn connect(config: &ImapConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        debug!("Connecting to IMAP server at {}", addr);

        let tcp_stream = TcpStream::connect(&addr).await?;
        let mut client = async_imap::Client::new(tcp_stream.compat());

        client
            .run_command_and_check_ok("STARTTLS", None)
            .await
            .map_err(|e| Error::Tls(format!("STARTTLS failed: {e}")))?;

        let server_name = ServerName::try_from(config.host.clone())
            .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;

        let inner = client.into_inner().into_inner();
        let tls_stream = tls_connector()
            .connect(server_name, inner)
            .await
            .map_err(|e| Error::Tls(e.to_string()))?;

        let tls_client = async_imap::Client::new(tls_stream.compat());

        let session = tls_client
            .login(&config.username, &config.password)
            .await
            .map_err(|(e, _)| Error::Imap(format!("Login failed: {e}")))?;

        info!("Connected to IMAP server");
        Ok(Self { session })
    }

    /// # Errors
    ///
    /// Returns an error if LOGOUT fails.
    pub async fn logout(mut self) -> Result<()> {
        self.session
            .logout()
            .await
            .map_err(|e| Error::Imap(format!("Logout failed: {e}")))
    }

    /// Discard responses left over from earlier commands.
    fn drain_unsolicited(&self) {
        while self.session.unsolicited_responses.try_recv().is_ok() {}
    }

    async fn uid_sort(&mut self, program: &str, charset: &str, expr: &str) -> Result<Vec<u32>> {
        self.drain_unsolicited();
        self.session
            .run_command_and_check_ok(format!("UID SORT {program} {charset} {expr}"))
            .await
            .map_err(|e| Error::Imap(format!("Sort failed: {e}")))?;

        let mut uids = Vec::new();
        while let Ok(response) = self.session.unsolicited_responses.try_recv() {
            if let UnsolicitedResponse::Other(ref data) = response
                && let Response::MailboxData(MailboxDatum::Sort(ids)) = data.parsed()
            {
                uids.extend(ids.iter().copied());
            }
        }
        Ok(uids)
    }
}

impl Transport for ImapTransport {
    async fn capabilities(&mut self) -> Result<Capabilities> {
        let caps = self
            .session
            .capabilities()
            .await
            .map_err(|e| Error::Imap(format!("Capability failed: {e}")))?;

        let advertised: Capabilities = INTERESTING
            .iter()
            .copied()
            .filter(|name| caps.has_str(*name))
            .filter(|name| {
                // imap-proto cannot parse `* THREAD` lines
                let threading = name.starts_with("THREAD=");
                if threading {
                    debug!("Server offers {name}; threading client-side");
                }
                !threading
            })
            .collect();
        Ok(advertised)
    }

    async fn list_folders(
        &mut self,
        reference: &str,
        pattern: &str,
        subscribed_only: bool,
    ) -> Result<Vec<FolderDescriptor>> {
        let command = if subscribed_only { "LSUB" } else { "LIST" };
        let stream = if subscribed_only {
            self.session
                .lsub(Some(reference), Some(pattern))
                .await
                .map_err(|e| Error::Imap(format!("{command} failed: {e}")))?
                .boxed_local()
        } else {
            self.session
                .list(Some(reference), Some(pattern))
                .await
                .map_err(|e| Error::Imap(format!("{command} failed: {e}")))?
                .boxed_local()
        };

        let folders = collect_folders(stream, command).await?;
        debug!("{command} \"{reference}\" \"{pattern}\" returned {} folders", folders.len());
        Ok(folders)
    }

    async fn resolve_ordering(&mut self, request: OrderingRequest<'_>) -> Result<ResolvedOrdering> {
        match request {
            OrderingRequest::Search { expr } => {
                let uids = self
                    .session
                    .uid_search(expr)
                    .await
                    .map_err(|e| Error::Imap(format!("Search failed: {e}")))?;
                let mut uids: Vec<u32> = uids.into_iter().collect();
                uids.sort_unstable();
                Ok(ResolvedOrdering::Flat(uids))
            }
            OrderingRequest::Sort {
                program,
                charset,
                expr,
            } => Ok(ResolvedOrdering::Flat(
                self.uid_sort(&program.to_imap(), charset, expr).await?,
            )),
            OrderingRequest::Thread { algorithm, .. } => Err(Error::NotYetSupported(format!(
                "THREAD={algorithm} over this transport"
            ))),
        }
    }

    async fn fetch_records(&mut self, uids: &[u32]) -> Result<HashMap<u32, MessageRecord>> {
        if uids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut messages = self
            .session
            .uid_fetch(uid_set(uids), FETCH_ITEMS)
            .await
            .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?;

        let mut records = HashMap::with_capacity(uids.len());
        while let Some(item) = messages.next().await {
            let fetch = item.map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;
            if let Some(record) = record(&fetch) {
                records.insert(record.uid, record);
            }
        }
        drop(messages);

        debug!("Fetched {} of {} records", records.len(), uids.len());
        Ok(records)
    }

    async fn select(&mut self, path: &str) -> Result<SelectResponse> {
        let mailbox = self
            .session
            .select(path)
            .await
            .map_err(|e| Error::Imap(format!("Failed to select {path}: {e}")))?;

        Ok(SelectResponse {
            flags: mailbox.flags.iter().map(flag_name).collect(),
            permanent_flags: mailbox.permanent_flags.iter().map(flag_name).collect(),
            exists: mailbox.exists,
            recent: Some(mailbox.recent),
            unseen: mailbox.unseen,
            uid_next: mailbox.uid_next,
            uid_validity: mailbox.uid_validity,
        })
    }

    async fn status(&mut self, path: &str) -> Result<FolderStatus> {
        let mailbox = self
            .session
            .status(path, STATUS_ITEMS)
            .await
            .map_err(|e| Error::Imap(format!("Status of {path} failed: {e}")))?;

        Ok(FolderStatus {
            messages: Some(mailbox.exists),
            recent: Some(mailbox.recent),
            uid_next: mailbox.uid_next,
            uid_validity: mailbox.uid_validity,
            unseen: mailbox.unseen,
        })
    }

    async fn unselect_or_close(&mut self, unselect: bool) -> Result<()> {
        if unselect {
            self.session
                .run_command_and_check_ok("UNSELECT")
                .await
                .map_err(|e| Error::Imap(format!("Unselect failed: {e}")))
        } else {
            self.session
                .close()
                .await
                .map_err(|e| Error::Imap(format!("Close failed: {e}")))
        }
    }

    async fn expunge(&mut self) -> Result<()> {
        self.session
            .run_command_and_check_ok("EXPUNGE")
            .await
            .map_err(|e| Error::Imap(format!("Expunge failed: {e}")))?;
        self.drain_unsolicited();
        Ok(())
    }

    async fn store_flags(
        &mut self,
        uids: &[u32],
        mode: StoreMode,
        flags: &[Flag],
    ) -> Result<HashMap<u32, Vec<Flag>>> {
        if uids.is_empty() || flags.is_empty() {
            return Ok(HashMap::new());
        }
        let query = format!("{} {}", mode.as_imap(), flag_list(flags));
        let updates = self
            .session
            .uid_store(uid_set(uids), &query)
            .await
            .map_err(|e| Error::Imap(format!("Store failed: {e}")))?;
        let mut updates = std::pin::pin!(updates);

        let mut echoed = HashMap::with_capacity(uids.len());
        while let Some(item) = updates.next().await {
            let fetch = item.map_err(|e| Error::Imap(format!("Store error: {e}")))?;
            if let Some(uid) = fetch.uid {
                echoed.insert(uid, fetch.flags().map(|flag| Flag::parse(&flag_name(&flag))).collect());
            }
        }

        debug!("STORE {query} echoed {} of {} messages", echoed.len(), uids.len());
        Ok(echoed)
    }

    async fn append(&mut self, path: &str, flags: &[Flag], message: &[u8]) -> Result<()> {
        let flags = (!flags.is_empty()).then(|| flag_list(flags));
        self.session
            .append(path, flags.as_deref(), None, message)
            .await
            .map_err(|e| Error::Imap(format!("Append to {path} failed: {e}")))?;
        self.drain_unsolicited();
        info!("Appended {} bytes to {path}", message.len());
        Ok(())
    }

    async fn fetch_raw(&mut self, uid: u32, section: RawSection) -> Result<Option<Vec<u8>>> {
        let mut messages = self
            .session
            .uid_fetch(uid.to_string(), section.fetch_item())
            .await
            .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?;

        let mut raw = None;
        while let Some(item) = messages.next().await {
            let fetch = item.map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;
            if fetch.uid != Some(uid) {
                continue;
            }
            let bytes = match section {
                RawSection::Full => fetch.body(),
                RawSection::Header => fetch.header(),
            };
            if let Some(bytes) = bytes {
                raw = Some(bytes.to_vec());
            }
        }
        drop(messages);

        debug!("{} of UID {uid}: {} bytes", section.fetch_item(), raw.as_ref().map_or(0, Vec::len));
        Ok(raw)
    }
}

fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Drain a LIST/LSUB response. An entry that fails to parse fails the
/// whole listing.
async fn collect_folders<S>(mut stream: S, command: &str) -> Result<Vec<FolderDescriptor>>
where
    S: Stream<Item = async_imap::error::Result<Name>> + Unpin,
{
    let mut folders = Vec::new();
    while let Some(item) = stream.next().await {
        let name = item.map_err(|e| Error::Parse(format!("{command} entry: {e}")))?;
        folders.push(descriptor(&name));
    }
    Ok(folders)
}

fn descriptor(name: &Name) -> FolderDescriptor {
    let mut descriptor = FolderDescriptor::from_name(name.name(), name.delimiter());
    for attribute in name.attributes() {
        if *attribute == NameAttribute::NoSelect {
            descriptor.no_select = true;
        } else if descriptor.special_use.is_none() {
            let raw = format!("{attribute:?}");
            if SpecialUse::from_attribute(&raw).is_some() {
                descriptor.special_use = Some(raw);
            }
        }
    }
    descriptor
}

fn flag_name(flag: &async_imap::types::Flag<'_>) -> String {
    use async_imap::types::Flag as ImapFlag;
    match flag {
        ImapFlag::Seen => "\\Seen".to_string(),
        ImapFlag::Answered => "\\Answered".to_string(),
        ImapFlag::Flagged => "\\Flagged".to_string(),
        ImapFlag::Deleted => "\\Deleted".to_string(),
        ImapFlag::Draft => "\\Draft".to_string(),
        ImapFlag::Recent => "\\Recent".to_string(),
        ImapFlag::MayCreate => ANY_KEYWORD.to_string(),
        ImapFlag::Custom(name) => name.to_string(),
    }
}

fn record(fetch: &Fetch) -> Option<MessageRecord> {
    let uid = fetch.uid?;
    let envelope = fetch.envelope().map(convert_envelope).unwrap_or_default();
    Some(MessageRecord {
        uid,
        envelope,
        size: fetch.size.unwrap_or(0),
        flags: fetch
            .flags()
            .map(|flag| Flag::parse(&flag_name(&flag)))
            .collect(),
        internal_date: fetch.internal_date(),
    })
}

fn text(raw: Option<&Cow<'_, [u8]>>) -> Option<String> {
    raw.map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn addresses(list: Option<&Vec<async_imap::imap_proto::Address<'_>>>) -> Vec<Address> {
    list.map(|list| {
        list.iter()
            .map(|a| Address {
                name: text(a.name.as_ref()),
                mailbox: text(a.mailbox.as_ref()),
                host: text(a.host.as_ref()),
            })
            .collect()
    })
    .unwrap_or_default()
}

fn convert_envelope(envelope: &async_imap::imap_proto::Envelope<'_>) -> Envelope {
    Envelope {
        date: text(envelope.date.as_ref()),
        subject: text(envelope.subject.as_ref()),
        from: addresses(envelope.from.as_ref()),
        sender: addresses(envelope.sender.as_ref()),
        reply_to: addresses(envelope.reply_to.as_ref()),
        to: addresses(envelope.to.as_ref()),
        cc: addresses(envelope.cc.as_ref()),
        bcc: addresses(envelope.bcc.as_ref()),
        in_reply_to: text(envelope.in_reply_to.as_ref()),
        message_id: text(envelope.message_id.as_ref()),
    }
}

/// Build a TLS connector that accepts all certificates.
///
/// Local bridges and test servers use self-signed certificates, so
/// verification is skipped entirely.
fn tls_connector() -> TlsConnector {
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// Certificate verifier that accepts all certificates.
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
