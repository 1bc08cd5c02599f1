pub mod digest_verifier;
