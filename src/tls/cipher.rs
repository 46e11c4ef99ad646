//! Cipher suite policy
//!
//! Classifies cipher suite names as weak or acceptable and builds the
//! OpenSSL cipher strings applied to every client context. Both OpenSSL
//! style names (`ECDHE-RSA-AES128-GCM-SHA256`) and IANA/JSSE style names
//! (`TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256`) are understood.

/// Cipher string used when no explicit suites are configured (TLS <= 1.2)
pub const DEFAULT_CIPHER_LIST: &str = "ECDHE+AESGCM:ECDHE+CHACHA20:DHE+AESGCM:DHE+CHACHA20:\
ECDHE+AES:DHE+AES:RSA+AESGCM:RSA+AES:!aNULL:!eNULL:!EXPORT:!DES:!3DES:!RC4:!RC2:!MD5:!PSK:!SRP";

/// Exclusions appended to every explicit cipher list
pub const WEAK_EXCLUSIONS: &str = "!aNULL:!eNULL:!EXPORT:!DES:!3DES:!RC4:!RC2:!MD5";

/// TLS 1.3 suites are configured separately from the legacy cipher list
const TLS13_SUITES: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "TLS_AES_128_CCM_SHA256",
    "TLS_AES_128_CCM_8_SHA256",
];

/// Name fragments marking a suite as weak, checked against the upper-cased name
const WEAK_MARKERS: &[&str] = &[
    "NULL",
    "ANON",
    "ADH",
    "AECDH",
    "EXPORT",
    "EXP-",
    "EXP1024",
    "RC4",
    "RC2",
    "3DES",
    "DES_EDE",
    "DES-CBC3",
    "DES-CBC-",
    "_DES_",
    "DES40",
    "MD5",
    "KRB5",
];

/// Returns true if the suite uses NULL encryption, anonymous key exchange,
/// export-grade keys, DES/3DES, RC2/RC4 or MD5.
pub fn is_weak(name: &str) -> bool {
    let upper = name.trim().to_ascii_uppercase();
    if is_tls13_suite(&upper) {
        return false;
    }
    // OpenSSL spells single DES as "DES-CBC-SHA" and IANA as "WITH_DES_CBC"
    if upper.starts_with("DES-") || upper.contains("WITH_DES_CBC") {
        return true;
    }
    WEAK_MARKERS.iter().any(|marker| upper.contains(marker))
}

/// Returns true for TLS 1.3 suite names
pub fn is_tls13_suite(name: &str) -> bool {
    TLS13_SUITES
        .iter()
        .any(|suite| suite.eq_ignore_ascii_case(name.trim()))
}

/// Explicit suites split by the protocol generation they apply to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CipherSelection {
    /// Suites for TLS 1.2 and below (OpenSSL cipher list)
    pub legacy: Vec<String>,
    /// TLS 1.3 suites
    pub tls13: Vec<String>,
    /// Names dropped because they are weak
    pub rejected: Vec<String>,
}

impl CipherSelection {
    /// Partition an explicit suite list, dropping weak entries
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut selection = CipherSelection::default();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if is_weak(name) {
                selection.rejected.push(name.to_string());
            } else if is_tls13_suite(name) {
                selection.tls13.push(name.to_ascii_uppercase());
            } else {
                selection.legacy.push(name.to_string());
            }
        }
        selection
    }

    /// True when nothing usable survived
    pub fn is_empty(&self) -> bool {
        self.legacy.is_empty() && self.tls13.is_empty()
    }

    /// OpenSSL cipher string for the legacy suites, with weak exclusions
    pub fn legacy_cipher_list(&self) -> Option<String> {
        if self.legacy.is_empty() {
            return None;
        }
        Some(format!("{}:{}", self.legacy.join(":"), WEAK_EXCLUSIONS))
    }

    /// OpenSSL ciphersuites string for TLS 1.3
    pub fn tls13_ciphersuites(&self) -> Option<String> {
        if self.tls13.is_empty() {
            None
        } else {
            Some(self.tls13.join(":"))
        }
    }
}
