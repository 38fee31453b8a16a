//! JWT signing and verification over a rotating key ring.
//!
//! [`JwtService`] signs with one active key and verifies against the active
//! key plus a bounded list of retired keys, picked by the `kid` header.
//! Rotation replaces the whole [`KeyRing`] through an `ArcSwap`, so
//! verification never waits on it.
//!
//! RS256 and RS384 use 2048-bit RSA keys. ES384 uses P-384, which is much
//! cheaper to generate and is what the tests use.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, decode_header,
    encode,
};
use p384::pkcs8::EncodePrivateKey as _;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const RSA_KEY_BITS: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token could not be signed: {message}")]
    Signing { message: String },

    /// Not a JWT, or a JWT without a `kid`.
    #[error("Malformed token: {message}")]
    Malformed { message: String },

    #[error("Token expired")]
    Expired,

    #[error("Invalid signature")]
    InvalidSignature,

    /// Issuer mismatch or a missing required claim.
    #[error("Invalid claims: {message}")]
    InvalidClaims { message: String },

    /// The `kid` header names a key that is not in the ring.
    #[error("Unknown signing key: {kid}")]
    UnknownKey { kid: String },

    #[error("Key generation failed: {message}")]
    KeyGeneration { message: String },

    #[error("Unsupported signing algorithm '{name}'")]
    UnsupportedAlgorithm { name: String },
}

impl JwtError {
    fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    fn key_generation(err: impl fmt::Display) -> Self {
        Self::KeyGeneration {
            message: err.to_string(),
        }
    }

    /// Returns `true` if no key in the ring vouches for the token.
    #[must_use]
    pub fn is_signature_error(&self) -> bool {
        matches!(self, Self::InvalidSignature | Self::UnknownKey { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::MissingRequiredClaim(_) => Self::InvalidClaims {
                message: err.to_string(),
            },
            _ => Self::malformed(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    RS256,
    RS384,
    ES384,
}

impl SigningAlgorithm {
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Name used in `alg` headers, JWKs and discovery metadata.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES384 => "ES384",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::RS256, Self::RS384, Self::ES384]
            .into_iter()
            .find(|alg| alg.as_str() == s)
            .ok_or_else(|| JwtError::UnsupportedAlgorithm { name: s.to_string() })
    }
}

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenClaims {
    /// Issuer (authorization server identifier).
    pub iss: String,

    /// Subject (principal ID).
    pub sub: String,

    /// Audience (the client the token was issued to).
    pub aud: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// JWT ID.
    pub jti: String,

    /// Space-separated scopes.
    pub scope: String,

    /// OAuth client ID.
    pub client_id: String,
}

impl AccessTokenClaims {
    /// Starts building claims issued now with a one hour lifetime.
    #[must_use]
    pub fn builder(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        client_id: impl Into<String>,
    ) -> AccessTokenClaimsBuilder {
        AccessTokenClaimsBuilder::new(issuer, subject, client_id)
    }
}

/// Builder for [`AccessTokenClaims`].
#[derive(Debug)]
pub struct AccessTokenClaimsBuilder {
    issuer: String,
    subject: String,
    client_id: String,
    issued_at: OffsetDateTime,
    expires_at: OffsetDateTime,
    scope: String,
}

impl AccessTokenClaimsBuilder {
    fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            issuer: issuer.into(),
            subject: subject.into(),
            client_id: client_id.into(),
            issued_at: now,
            expires_at: now + time::Duration::hours(1),
            scope: String::new(),
        }
    }

    /// Sets the issue and expiry instants.
    #[must_use]
    pub fn validity(mut self, issued_at: OffsetDateTime, expires_at: OffsetDateTime) -> Self {
        self.issued_at = issued_at;
        self.expires_at = expires_at;
        self
    }

    /// Sets the space-separated scope string.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Builds the claims with a fresh `jti`.
    #[must_use]
    pub fn build(self) -> AccessTokenClaims {
        AccessTokenClaims {
            iss: self.issuer,
            sub: self.subject,
            aud: self.client_id.clone(),
            exp: self.expires_at.unix_timestamp(),
            iat: self.issued_at.unix_timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
            scope: self.scope,
            client_id: self.client_id,
        }
    }
}

/// Public half of the key ring, served at `/oauth2/jwks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// A public verification key (RFC 7517). RSA keys carry `n` and `e`, EC
/// keys carry `crv`, `x` and `y`, all base64url without padding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// A key the ring can sign or verify with. The private half never leaves
/// this struct.
pub struct SigningKeyPair {
    /// Published as `kid`.
    pub kid: String,
    pub algorithm: SigningAlgorithm,
    pub created_at: OffsetDateTime,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public: PublicComponents,
}

enum PublicComponents {
    Rsa { n: Vec<u8>, e: Vec<u8> },
    Ec { x: Vec<u8>, y: Vec<u8> },
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Generates a fresh key for `algorithm` with a random `kid`.
    ///
    /// RSA generation takes long enough that async callers should run it on
    /// a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns `KeyGeneration` if the key cannot be created or encoded.
    pub fn generate(algorithm: SigningAlgorithm) -> Result<Self, JwtError> {
        match algorithm {
            SigningAlgorithm::RS256 | SigningAlgorithm::RS384 => Self::generate_rsa(algorithm),
            SigningAlgorithm::ES384 => Self::generate_ec(),
        }
    }

    /// Generates a P-384 key for ES384.
    ///
    /// # Errors
    ///
    /// Returns `KeyGeneration` if the key cannot be encoded.
    pub fn generate_ec() -> Result<Self, JwtError> {
        let secret = p384::SecretKey::random(&mut OsRng);
        let point = p384::ecdsa::SigningKey::from(&secret)
            .verifying_key()
            .to_encoded_point(false);
        let (Some(x), Some(y)) = (point.x(), point.y()) else {
            return Err(JwtError::key_generation("P-384 point has no affine coordinates"));
        };

        // jsonwebtoken reads EC private keys from PKCS#8 only
        let private_pem = secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(JwtError::key_generation)?;
        let encoding_key =
            EncodingKey::from_ec_pem(private_pem.as_bytes()).map_err(JwtError::key_generation)?;
        let decoding_key = DecodingKey::from_ec_components(
            &URL_SAFE_NO_PAD.encode(x),
            &URL_SAFE_NO_PAD.encode(y),
        )
        .map_err(JwtError::key_generation)?;

        Ok(Self::assemble(
            SigningAlgorithm::ES384,
            encoding_key,
            decoding_key,
            PublicComponents::Ec {
                x: x.to_vec(),
                y: y.to_vec(),
            },
        ))
    }

    fn generate_rsa(algorithm: SigningAlgorithm) -> Result<Self, JwtError> {
        let private =
            RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS).map_err(JwtError::key_generation)?;
        let public = private.to_public_key();

        let private_pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(JwtError::key_generation)?;
        let public_pem = public
            .to_public_key_pem(LineEnding::LF)
            .map_err(JwtError::key_generation)?;
        let encoding_key =
            EncodingKey::from_rsa_pem(private_pem.as_bytes()).map_err(JwtError::key_generation)?;
        let decoding_key =
            DecodingKey::from_rsa_pem(public_pem.as_bytes()).map_err(JwtError::key_generation)?;

        Ok(Self::assemble(
            algorithm,
            encoding_key,
            decoding_key,
            PublicComponents::Rsa {
                n: public.n().to_bytes_be(),
                e: public.e().to_bytes_be(),
            },
        ))
    }

    fn assemble(
        algorithm: SigningAlgorithm,
        encoding_key: EncodingKey,
        decoding_key: DecodingKey,
        public: PublicComponents,
    ) -> Self {
        Self {
            kid: uuid::Uuid::new_v4().to_string(),
            algorithm,
            created_at: OffsetDateTime::now_utc(),
            encoding_key,
            decoding_key,
            public,
        }
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        let (kty, n, e, crv, x, y) = match &self.public {
            PublicComponents::Rsa { n, e } => (
                "RSA",
                Some(URL_SAFE_NO_PAD.encode(n)),
                Some(URL_SAFE_NO_PAD.encode(e)),
                None,
                None,
                None,
            ),
            PublicComponents::Ec { x, y } => (
                "EC",
                None,
                None,
                Some("P-384".to_string()),
                Some(URL_SAFE_NO_PAD.encode(x)),
                Some(URL_SAFE_NO_PAD.encode(y)),
            ),
        };

        Jwk {
            kty: kty.to_string(),
            kid: self.kid.clone(),
            use_: "sig".to_string(),
            alg: self.algorithm.as_str().to_string(),
            n,
            e,
            crv,
            x,
            y,
        }
    }
}

/// The active signing key and the retired keys still accepted for
/// verification, newest first.
///
/// A retired key stays in the ring until every token it signed has
/// expired. Beyond that, the newest `keys_to_keep` retired keys are kept.
#[derive(Debug, Clone)]
pub struct KeyRing {
    active: Arc<SigningKeyPair>,
    retired: Vec<RetiredKey>,
}

#[derive(Debug, Clone)]
struct RetiredKey {
    key: Arc<SigningKeyPair>,
    needed_until: OffsetDateTime,
}

impl KeyRing {
    fn new(active: SigningKeyPair) -> Self {
        Self {
            active: Arc::new(active),
            retired: Vec::new(),
        }
    }

    /// The key new tokens are signed with.
    #[must_use]
    pub fn active(&self) -> &SigningKeyPair {
        &self.active
    }

    /// Finds a key by `kid`, active or retired.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&SigningKeyPair> {
        self.keys().find(|key| key.kid == kid)
    }

    /// Every key in the ring, active first.
    pub fn keys(&self) -> impl Iterator<Item = &SigningKeyPair> {
        std::iter::once(&*self.active).chain(self.retired.iter().map(|r| &*r.key))
    }

    fn rotated(
        &self,
        next: Arc<SigningKeyPair>,
        needed_until: OffsetDateTime,
        keys_to_keep: usize,
        now: OffsetDateTime,
    ) -> Self {
        let outgoing = RetiredKey {
            key: Arc::clone(&self.active),
            needed_until,
        };
        let retired = std::iter::once(outgoing)
            .chain(self.retired.iter().cloned())
            .enumerate()
            .filter(|(i, r)| *i < keys_to_keep || r.needed_until > now)
            .map(|(_, r)| r)
            .collect();
        Self {
            active: next,
            retired,
        }
    }
}

/// Service for encoding and decoding JWT tokens.
///
/// This service is thread-safe (`Send + Sync`) and can be shared across
/// async tasks.
pub struct JwtService {
    ring: ArcSwap<KeyRing>,
    issuer: String,
    keys_to_keep: usize,
}

impl JwtService {
    /// Creates a new JWT service.
    ///
    /// # Arguments
    /// * `signing_key` - The initial active key
    /// * `issuer` - The issuer claim value
    /// * `keys_to_keep` - Number of retired keys kept for verification
    #[must_use]
    pub fn new(signing_key: SigningKeyPair, issuer: impl Into<String>, keys_to_keep: usize) -> Self {
        Self {
            ring: ArcSwap::from_pointee(KeyRing::new(signing_key)),
            issuer: issuer.into(),
            keys_to_keep,
        }
    }

    /// Encodes claims into a JWT signed by the active key.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let ring = self.ring.load();
        let key = ring.active();

        let mut header = Header::new(key.algorithm.to_jwt_algorithm());
        header.kid = Some(key.kid.clone());

        encode(&header, claims, &key.encoding_key).map_err(|e| JwtError::Signing {
            message: e.to_string(),
        })
    }

    /// Decodes a JWT and verifies its signature and issuer.
    ///
    /// Expiry is not checked here; callers compare `exp` against their own
    /// clock so that the boundary is exact.
    ///
    /// # Errors
    /// Returns `UnknownKey` if the `kid` is not in the ring,
    /// `InvalidSignature` if verification fails, `InvalidClaims` on an issuer
    /// mismatch and `Malformed` otherwise.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<TokenData<T>, JwtError> {
        let header = decode_header(token)?;
        let kid = header
            .kid
            .ok_or_else(|| JwtError::malformed("token header has no kid"))?;

        let ring = self.ring.load();
        let key = ring.find(&kid).ok_or_else(|| JwtError::UnknownKey { kid: kid.clone() })?;

        let mut validation = Validation::new(key.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = false;
        validation.validate_aud = false;

        decode(token, &key.decoding_key, &validation).map_err(JwtError::from)
    }

    /// Installs `next` as the active key and retires the previous one.
    ///
    /// The outgoing key keeps verifying until `needed_until`, which callers
    /// set to the expiry of the last token it can have signed. Retired keys
    /// past their deadline are pruned, except the newest `keys_to_keep`.
    ///
    /// Returns the `kid` of the new active key.
    pub fn rotate(&self, next: SigningKeyPair, needed_until: OffsetDateTime) -> String {
        let kid = next.kid.clone();
        let next = Arc::new(next);
        let now = OffsetDateTime::now_utc();
        self.ring.rcu(|ring| {
            ring.rotated(Arc::clone(&next), needed_until, self.keys_to_keep, now)
        });
        kid
    }

    /// Returns the active signing key ID.
    #[must_use]
    pub fn current_kid(&self) -> String {
        self.ring.load().active().kid.clone()
    }

    /// Algorithm of the active key.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.ring.load().active().algorithm
    }

    /// Returns the issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the JWKS for every key in the ring.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: self.ring.load().keys().map(SigningKeyPair::to_jwk).collect(),
        }
    }
}

impl fmt::Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.issuer)
            .field("current_kid", &self.current_kid())
            .field("keys_to_keep", &self.keys_to_keep)
            .finish()
    }
}
