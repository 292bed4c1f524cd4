//! Document handle: storage strategies, phase checks and signed output.

mod common;

use common::{b64, build_pdf, fake_signature, pdf_with_empty_field, simple_pdf, xref_stream_pdf};
use pdf_ais::signatures::{ByteRangeCalculator, DigestAlgorithm};
use pdf_ais::{Error, Pdf, PdfBuilder, PdfDocument, PdfOptions, Phase, StorageStrategy};
use std::io::{Cursor, Write};

/// Checks that `signed` is `original` plus an incremental update whose
/// signature covers everything but `/Contents`, and that `/Contents` holds
/// `signature` followed by zero padding.
fn assert_signed(signed: &[u8], original: &[u8], digest: &str, signature: &[u8], field: &str) {
    assert!(signed.starts_with(original), "original bytes must be kept verbatim");

    let mut doc = PdfDocument::from_bytes(signed.to_vec()).unwrap();
    let found = doc.find_field(field).unwrap().expect("signature field");
    assert_eq!(found.field_type.as_deref(), Some("Sig"));
    let sig = doc.resolve_dict(found.dict.get("V").unwrap()).unwrap();
    assert_eq!(sig["Type"].as_name(), Some("Sig"));
    assert_eq!(sig["SubFilter"].as_name(), Some("adbe.pkcs7.detached"));

    let range: Vec<u64> = sig["ByteRange"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o.as_integer().unwrap() as u64)
        .collect();
    let range = [range[0], range[1], range[2], range[3]];
    assert_eq!(range[0], 0);
    assert_eq!(range[2] + range[3], signed.len() as u64);

    let parts = ByteRangeCalculator::signed_slices(signed, &range).unwrap();
    assert_eq!(b64(&DigestAlgorithm::Sha256.digest_parts(&parts)), digest);

    let contents = sig["Contents"].as_string().unwrap();
    assert!(contents.starts_with(signature));
    assert!(contents[signature.len()..].iter().all(|&b| b == 0));

    let catalog = doc.catalog().unwrap();
    let perms = doc.resolve_dict(&catalog["Perms"]).unwrap();
    assert!(perms.contains_key("DocMDP"));
}

#[test]
fn test_path_source_is_buffered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in.pdf");
    let original = simple_pdf();
    std::fs::write(&path, &original).unwrap();

    let mut pdf = PdfBuilder::new().input_path(&path).sig_size(1024).build().unwrap();
    assert_eq!(pdf.strategy(), StorageStrategy::Buffered);
    assert_eq!(pdf.phase(), Phase::Constructed);

    let digest = pdf.digest().unwrap();
    let signature = fake_signature(300);
    pdf.write_signature(&signature).unwrap();
    assert_eq!(pdf.phase(), Phase::Signed);

    let signed = pdf.into_signed_bytes().unwrap();
    assert_signed(&signed, &original, &digest, &signature, "Signature");
    assert_eq!(std::fs::read(&path).unwrap(), original, "input file is not touched");
}

#[test]
fn test_from_path_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Pdf::from_path(dir.path().join("missing.pdf")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_reader_source_into_destination() {
    let original = simple_pdf();
    let mut reader: &[u8] = &original;
    let mut dest = Cursor::new(Vec::new());
    dest.write_all(b"leading bytes").unwrap();

    let digest;
    let signature = fake_signature(100);
    {
        let mut pdf = PdfBuilder::new()
            .input_stream(&mut reader)
            .out_stream(&mut dest)
            .sig_size(512)
            .build()
            .unwrap();
        assert_eq!(pdf.strategy(), StorageStrategy::Buffered);
        digest = pdf.digest().unwrap();
        pdf.write_signature(&signature).unwrap();
        assert!(pdf.signed_bytes().is_none());
    }

    let written = dest.into_inner();
    assert!(written.starts_with(b"leading bytes"));
    assert_signed(&written[b"leading bytes".len()..], &original, &digest, &signature, "Signature");
}

#[test]
fn test_seekable_source_is_copied_out() {
    let original = simple_pdf();
    let mut source = Cursor::new(original.clone());

    let mut pdf = PdfBuilder::new().input_seekable(&mut source).sig_size(256).build().unwrap();
    assert_eq!(pdf.strategy(), StorageStrategy::CopyOut);
    let digest = pdf.digest().unwrap();
    let signature = fake_signature(64);
    pdf.write_signature(&signature).unwrap();

    let signed = pdf.into_signed_bytes().unwrap();
    assert_signed(&signed, &original, &digest, &signature, "Signature");
    assert_eq!(source.into_inner(), original, "seekable source is never written");
}

#[test]
fn test_seekable_source_with_destination() {
    let original = simple_pdf();
    let mut source = Cursor::new(original.clone());
    let mut dest = Cursor::new(Vec::new());

    let (digest, signature) = {
        let mut pdf = PdfBuilder::new()
            .input_seekable(&mut source)
            .out_stream(&mut dest)
            .sig_size(256)
            .build()
            .unwrap();
        assert_eq!(pdf.strategy(), StorageStrategy::CopyOut);
        let digest = pdf.digest().unwrap();
        let signature = fake_signature(128);
        pdf.write_signature(&signature).unwrap();
        (digest, signature)
    };

    assert_signed(dest.get_ref(), &original, &digest, &signature, "Signature");
    assert_eq!(source.into_inner(), original);
}

#[test]
fn test_inout_stream_is_signed_in_place() {
    let original = simple_pdf();
    let mut stream = Cursor::new(original.clone());

    let (digest, signature) = {
        let mut pdf = PdfBuilder::new().inout_stream(&mut stream).sig_size(512).build().unwrap();
        assert_eq!(pdf.strategy(), StorageStrategy::InPlace);
        let digest = pdf.digest().unwrap();
        let signature = fake_signature(200);
        pdf.write_signature(&signature).unwrap();
        assert!(pdf.into_signed_bytes().is_none());
        (digest, signature)
    };

    assert_signed(stream.get_ref(), &original, &digest, &signature, "Signature");
}

#[test]
fn test_inout_stream_with_destination_is_rejected() {
    let mut stream = Cursor::new(simple_pdf());
    let mut dest = Cursor::new(Vec::new());
    let err = PdfBuilder::new()
        .inout_stream(&mut stream)
        .out_stream(&mut dest)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_digest_is_base64_sha256() {
    let original = simple_pdf();
    let mut first: &[u8] = &original;
    let mut second: &[u8] = &original;

    let mut a = PdfBuilder::new().input_stream(&mut first).build().unwrap();
    let mut b = PdfBuilder::new().input_stream(&mut second).build().unwrap();
    let da = a.digest().unwrap();
    let db = b.digest().unwrap();

    for digest in [&da, &db] {
        assert_eq!(digest.len(), 44);
        assert_eq!(pdf_ais::signatures::DocumentDigest::decode_base64(digest).unwrap().len(), 32);
    }
    assert_ne!(da, db, "each placeholder carries its own document id");
    assert_eq!(a.document_digest().unwrap().to_base64(), da);
}

#[test]
fn test_write_before_digest_fails() {
    let original = simple_pdf();
    let mut reader: &[u8] = &original;
    let mut pdf = PdfBuilder::new().input_stream(&mut reader).build().unwrap();

    let err = pdf.write_signature(&fake_signature(10)).unwrap_err();
    assert!(matches!(err, Error::IllegalState(_)));
    assert_eq!(pdf.phase(), Phase::Constructed);
    assert_eq!(pdf.signed_bytes().unwrap(), &original[..], "nothing written");
}

#[test]
fn test_second_digest_fails_without_damage() {
    let original = simple_pdf();
    let mut reader: &[u8] = &original;
    let mut pdf = PdfBuilder::new().input_stream(&mut reader).sig_size(128).build().unwrap();

    let digest = pdf.digest().unwrap();
    let after_first = pdf.signed_bytes().unwrap().to_vec();
    assert!(matches!(pdf.digest(), Err(Error::IllegalState(_))));
    assert_eq!(pdf.signed_bytes().unwrap(), &after_first[..]);

    let signature = fake_signature(50);
    pdf.write_signature(&signature).unwrap();
    assert!(matches!(pdf.write_signature(&signature), Err(Error::IllegalState(_))));
    assert_signed(pdf.signed_bytes().unwrap(), &original, &digest, &signature, "Signature");
}

#[test]
fn test_capacity_boundary() {
    let original = simple_pdf();
    let mut reader: &[u8] = &original;
    let mut pdf = PdfBuilder::new().input_stream(&mut reader).sig_size(64).build().unwrap();
    assert_eq!(pdf.signature_capacity(), 64);

    let digest = pdf.digest().unwrap();
    let reserved = pdf.signed_bytes().unwrap().to_vec();

    let err = pdf.write_signature(&fake_signature(42)).unwrap_err();
    assert!(matches!(err, Error::SignatureTooLarge(84)));
    assert_eq!(err.to_string(), "84 bytes");
    assert_eq!(pdf.signed_bytes().unwrap(), &reserved[..], "no partial write");
    assert_eq!(pdf.phase(), Phase::Digested);

    let err = pdf.write_signature(&fake_signature(33)).unwrap_err();
    assert!(matches!(err, Error::SignatureTooLarge(66)));

    let signature = fake_signature(32);
    pdf.write_signature(&signature).unwrap();
    let signed = pdf.into_signed_bytes().unwrap();
    assert_eq!(signed.len(), reserved.len());
    assert_signed(&signed, &original, &digest, &signature, "Signature");
}

#[test]
fn test_existing_signature_field_is_reused() {
    let original = pdf_with_empty_field();
    let mut reader: &[u8] = &original;
    let mut pdf = PdfBuilder::new()
        .input_stream(&mut reader)
        .sig_name("Approval")
        .sig_size(256)
        .build()
        .unwrap();
    assert_eq!(pdf.field_name(), "Approval");

    let digest = pdf.digest().unwrap();
    let signature = fake_signature(90);
    pdf.write_signature(&signature).unwrap();
    let signed = pdf.into_signed_bytes().unwrap();
    assert_signed(&signed, &original, &digest, &signature, "Approval");

    let mut doc = PdfDocument::from_bytes(signed).unwrap();
    let field = doc.find_field("Approval").unwrap().unwrap();
    assert_eq!(field.reference.id, 6);
    let page = doc.first_page().unwrap().1;
    assert_eq!(page["Annots"].as_array().unwrap().len(), 1, "no extra widget");
}

#[test]
fn test_new_field_with_metadata() {
    let original = pdf_with_empty_field();
    let mut reader: &[u8] = &original;
    let options = PdfOptions::new()
        .with_field_name("Second")
        .with_sig_size(128)
        .with_reason("Contract approval")
        .with_location("Bern");
    let mut pdf = PdfBuilder::new().input_stream(&mut reader).options(options).build().unwrap();

    let digest = pdf.digest().unwrap();
    let signature = fake_signature(16);
    pdf.write_signature(&signature).unwrap();
    let signed = pdf.into_signed_bytes().unwrap();
    assert_signed(&signed, &original, &digest, &signature, "Second");

    let mut doc = PdfDocument::from_bytes(signed).unwrap();
    let field = doc.find_field("Second").unwrap().unwrap();
    assert_eq!(field.dict["F"].as_integer(), Some(132));
    let sig = doc.resolve_dict(&field.dict["V"]).unwrap();
    assert_eq!(sig["Reason"].as_string(), Some(&b"Contract approval"[..]));
    assert_eq!(sig["Location"].as_string(), Some(&b"Bern"[..]));

    let page = doc.first_page().unwrap().1;
    assert_eq!(page["Annots"].as_array().unwrap().len(), 2);
    assert!(doc.find_field("Approval").unwrap().is_some());
}

#[test]
fn test_text_metadata_is_encoded() {
    let original = simple_pdf();
    let mut reader: &[u8] = &original;
    let options = PdfOptions::new()
        .with_sig_size(128)
        .with_signer_name("Jürg Müller")
        .with_location("Zürich")
        .with_contact_info("Łukasz \u{2116} 7");
    let mut pdf = PdfBuilder::new().input_stream(&mut reader).options(options).build().unwrap();

    let digest = pdf.digest().unwrap();
    let signature = fake_signature(16);
    pdf.write_signature(&signature).unwrap();
    let signed = pdf.into_signed_bytes().unwrap();
    assert_signed(&signed, &original, &digest, &signature, "Signature");

    let mut doc = PdfDocument::from_bytes(signed).unwrap();
    let field = doc.find_field("Signature").unwrap().unwrap();
    let sig = doc.resolve_dict(&field.dict["V"]).unwrap();
    assert_eq!(sig["Location"].as_string(), Some(&[0x5A, 0xFC, 0x72, 0x69, 0x63, 0x68][..]));
    assert_eq!(sig["Location"].as_text_string().as_deref(), Some("Zürich"));
    assert_eq!(sig["Name"].as_text_string().as_deref(), Some("Jürg Müller"));
    assert!(sig["ContactInfo"].as_string().unwrap().starts_with(&[0xFE, 0xFF]));
    assert_eq!(sig["ContactInfo"].as_text_string().as_deref(), Some("Łukasz \u{2116} 7"));
    assert!(!sig.contains_key("Reason"));
}

#[test]
fn test_utf16_named_field_is_reused() {
    let original = build_pdf(&[
        "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [4 0 R] >> >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [4 0 R] >>",
        "<< /Type /Annot /Subtype /Widget /FT /Sig /T <FEFF005300690067> /Rect [0 0 10 10] /P 3 0 R >>",
    ]);
    let mut reader: &[u8] = &original;
    let mut pdf = PdfBuilder::new()
        .input_stream(&mut reader)
        .sig_name("Sig")
        .sig_size(64)
        .build()
        .unwrap();

    let digest = pdf.digest().unwrap();
    let signature = fake_signature(8);
    pdf.write_signature(&signature).unwrap();
    let signed = pdf.into_signed_bytes().unwrap();
    assert_signed(&signed, &original, &digest, &signature, "Sig");

    let mut doc = PdfDocument::from_bytes(signed).unwrap();
    assert_eq!(doc.find_field("Sig").unwrap().unwrap().reference.id, 4);
    let catalog = doc.catalog().unwrap();
    let form = doc.resolve_dict(&catalog["AcroForm"]).unwrap();
    assert_eq!(form["Fields"].as_array().unwrap().len(), 1);
    let page = doc.first_page().unwrap().1;
    assert_eq!(page["Annots"].as_array().unwrap().len(), 1);
}

#[test]
fn test_dotted_name_for_new_field_is_rejected() {
    let original = simple_pdf();
    let mut reader: &[u8] = &original;
    let result = PdfBuilder::new().input_stream(&mut reader).sig_name("Form.Sig").build();
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn test_non_signature_field_is_rejected() {
    let original = build_pdf(&[
        "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [4 0 R] >> >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Annots [4 0 R] >>",
        "<< /Type /Annot /Subtype /Widget /FT /Tx /T (Signature) /Rect [0 0 10 10] >>",
    ]);
    let mut reader: &[u8] = &original;
    let err = PdfBuilder::new().input_stream(&mut reader).build().unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_signed_document_cannot_be_certified_again() {
    let original = simple_pdf();
    let mut reader: &[u8] = &original;
    let mut pdf = PdfBuilder::new().input_stream(&mut reader).sig_size(64).build().unwrap();
    pdf.digest().unwrap();
    pdf.write_signature(&fake_signature(8)).unwrap();
    let signed = pdf.into_signed_bytes().unwrap();

    let mut same_field: &[u8] = &signed;
    let err = PdfBuilder::new().input_stream(&mut same_field).build().unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "field already signed");

    let mut other_field: &[u8] = &signed;
    let mut again = PdfBuilder::new().input_stream(&mut other_field).sig_name("Other").build().unwrap();
    assert!(matches!(again.digest(), Err(Error::InvalidInput(_))), "already certified");
    assert_eq!(again.phase(), Phase::Constructed);
}

#[test]
fn test_xref_stream_document() {
    let original = xref_stream_pdf();
    let mut reader: &[u8] = &original;
    let mut pdf = PdfBuilder::new().input_stream(&mut reader).sig_size(256).build().unwrap();

    let digest = pdf.digest().unwrap();
    let signature = fake_signature(77);
    pdf.write_signature(&signature).unwrap();
    let signed = pdf.into_signed_bytes().unwrap();
    assert_signed(&signed, &original, &digest, &signature, "Signature");

    let update = String::from_utf8_lossy(&signed[original.len()..]).into_owned();
    assert!(update.contains("/Type /XRef"));
    assert!(!update.contains("\ntrailer"));
}

#[test]
fn test_classic_document_gets_classic_update() {
    let original = simple_pdf();
    let mut reader: &[u8] = &original;
    let mut pdf = PdfBuilder::new().input_stream(&mut reader).sig_size(64).build().unwrap();
    pdf.digest().unwrap();
    let written = pdf.signed_bytes().unwrap();

    let update = String::from_utf8_lossy(&written[original.len()..]).into_owned();
    assert!(update.contains("\nxref\n"));
    assert!(update.contains("/Prev "));
    assert!(update.trim_end().ends_with("%%EOF"));
}
