/// The computational security parameter, in bits.
pub const SECURITY_PARAMETER: usize = 256;

/// The statistical security parameter.
///
/// This is also the number of repetitions in the modulus and ring-Pedersen proofs.
pub const STAT_PARAM: usize = 80;

/// Bit bound for plaintexts which should be curve scalars.
pub const L_BOUND: usize = 256;

/// Bit bound for the masks used when converting shares.
pub const L_PRIME_BOUND: usize = 5 * L_BOUND;

/// Slack added to ranges to make range proofs zero-knowledge.
pub const EPSILON: usize = 2 * L_BOUND;

/// The size of a Paillier modulus, in bits.
pub const PAILLIER_BITS: usize = 2048;

/// The size of each of the primes making up a Paillier modulus.
pub const PRIME_BITS: usize = PAILLIER_BITS / 2;

/// How many sieving windows we try before giving up on finding a safe prime.
pub const PRIME_SEARCH_WINDOWS: usize = 2_000;

/// How many odd candidates each sieving window covers.
pub const PRIME_SEARCH_WINDOW_SIZE: usize = 4096;

/// Maximum number of attempts when sampling a value satisfying some condition.
pub const CRYPTOGRAPHIC_RETRY_MAX: usize = 500;

/// The size of session identifiers, in bytes.
pub const SESSION_ID_LEN: usize = SECURITY_PARAMETER / 8;
