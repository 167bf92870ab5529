//! Cache keys derived from a request.
//!
//! Two keys with deliberately different precision:
//!
//! - [`request_fingerprint`] — exact identity of one request (image
//!   reference, query, type, detail, questions). Keys the process-local L1.
//! - [`semantic_key`] — analysis type plus image *content* signature only.
//!   Keys the shared L2, so rephrasings of a question about the same image
//!   share one bucket. The many-to-one mapping is accepted imprecision.
//!
//! Both are SHA-256 hex digests, stable across processes so the L2 key works
//! for every instance sharing the store. Every field is hashed with a length
//! prefix, so no byte inside a field can move a boundary.

use sha2::{Digest, Sha256};

use super::ContentSignature;
use crate::types::AnalysisRequest;

/// Hash one field as its little-endian `u64` length followed by its bytes.
fn field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Exact request fingerprint (L1 key).
///
/// Specific questions are sorted first, so question order never splits the
/// cache.
pub fn request_fingerprint(request: &AnalysisRequest) -> String {
    let mut questions: Vec<&str> = request
        .specific_questions
        .iter()
        .map(String::as_str)
        .collect();
    questions.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(b"fp:");
    field(&mut hasher, request.image.reference().as_bytes());
    field(&mut hasher, request.query.as_bytes());
    field(&mut hasher, request.analysis_type.as_str().as_bytes());
    field(&mut hasher, request.detail_level.as_str().as_bytes());
    hasher.update((questions.len() as u64).to_le_bytes());
    for q in questions {
        field(&mut hasher, q.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Coarse semantic key (L2 key).
pub fn semantic_key(request: &AnalysisRequest, signature: &ContentSignature) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"sem:");
    field(&mut hasher, request.analysis_type.as_str().as_bytes());
    field(&mut hasher, signature.digest.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SignatureKind;
    use crate::types::ImageRef;

    fn req(query: &str) -> AnalysisRequest {
        AnalysisRequest::new(ImageRef::url("https://img.example/a.png"), query)
    }

    fn sig(digest: &str) -> ContentSignature {
        ContentSignature {
            digest: digest.into(),
            kind: SignatureKind::Pixels,
        }
    }

    #[test]
    fn fingerprint_deterministic() {
        assert_eq!(request_fingerprint(&req("hi")), request_fingerprint(&req("hi")));
        assert_eq!(request_fingerprint(&req("hi")).len(), 64);
    }

    #[test]
    fn fingerprint_differs_on_query() {
        assert_ne!(request_fingerprint(&req("hi")), request_fingerprint(&req("hello")));
    }

    #[test]
    fn fingerprint_differs_on_detail_level() {
        let a = req("hi").detail_level("basic");
        let b = req("hi").detail_level("detailed");
        assert_ne!(request_fingerprint(&a), request_fingerprint(&b));
    }

    #[test]
    fn fingerprint_ignores_question_order() {
        let a = req("hi").questions(["one", "two"]);
        let b = req("hi").questions(["two", "one"]);
        assert_eq!(request_fingerprint(&a), request_fingerprint(&b));
    }

    #[test]
    fn fingerprint_field_boundaries_matter() {
        // "ab" + "" must not collide with "a" + "b" across fields.
        let a = req("ab").question("c");
        let b = req("a").question("bc");
        assert_ne!(request_fingerprint(&a), request_fingerprint(&b));
    }

    #[test]
    fn separator_bytes_inside_fields_do_not_collide() {
        // Same bytes once joined with 0x1f, split into fields differently.
        let a = req("q").analysis_type("t\x1fbasic");
        let b = req("q\x1ft").analysis_type("basic");
        assert_ne!(request_fingerprint(&a), request_fingerprint(&b));

        let a = req("q").question("one\x1ftwo");
        let b = req("q").questions(["one", "two"]);
        assert_ne!(request_fingerprint(&a), request_fingerprint(&b));

        let a = req("x").analysis_type("chart\x1f0123");
        let b = req("x").analysis_type("chart");
        assert_ne!(
            semantic_key(&a, &sig("456789abcdef")),
            semantic_key(&b, &sig("0123\x1f456789abcdef"))
        );
    }

    #[test]
    fn semantic_key_ignores_query_wording() {
        let s = sig("0123456789abcdef");
        assert_eq!(
            semantic_key(&req("what is this"), &s),
            semantic_key(&req("describe the picture"), &s)
        );
    }

    #[test]
    fn semantic_key_differs_on_type_and_content() {
        let s = sig("0123456789abcdef");
        let ocr = req("x").analysis_type("ocr");
        assert_ne!(semantic_key(&req("x"), &s), semantic_key(&ocr, &s));
        assert_ne!(
            semantic_key(&req("x"), &s),
            semantic_key(&req("x"), &sig("fedcba9876543210"))
        );
    }
}
