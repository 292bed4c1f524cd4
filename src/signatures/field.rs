//! Signature form fields.
//!
//! A signature value is attached to a form field. An existing unsigned
//! `/FT /Sig` field with the requested name is reused; otherwise an invisible
//! widget is created on the first page and registered in the AcroForm.

use crate::document::{AcroFormLocation, PdfDocument};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::IncrementalUpdate;

/// AcroForm `/SigFlags`: SignaturesExist (1) | AppendOnly (2).
pub const SIG_FLAGS: i64 = 3;

/// Annotation flags of a new widget: Print (4) | Locked (128).
pub const INVISIBLE_WIDGET_FLAGS: i64 = 132;

/// Requested signature field.
#[derive(Debug, Clone, PartialEq)]
pub struct SigFieldSpec {
    /// Fully qualified field name
    pub name: String,
    /// Widget rectangle of a newly created field
    pub rect: [f64; 4],
    /// Annotation flags of a newly created field
    pub annotation_flags: i64,
}

impl SigFieldSpec {
    /// Invisible field named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rect: [0.0; 4],
            annotation_flags: INVISIBLE_WIDGET_FLAGS,
        }
    }
}

/// How the signature will be attached.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPlan {
    /// Reuse this unsigned field
    Existing {
        /// Field object
        reference: ObjectRef,
        /// Field dictionary as currently stored
        dict: Dictionary,
    },
    /// Create a widget on the first page
    New,
}

/// Decide where the signature goes, failing early for unusable fields.
pub fn plan_field(doc: &mut PdfDocument, spec: &SigFieldSpec) -> Result<FieldPlan> {
    let Some(found) = doc.find_field(&spec.name)? else {
        if spec.name.contains('.') {
            return Err(Error::InvalidInput(format!(
                "no field {:?}; new fields can only be created at the top level of the form",
                spec.name
            )));
        }
        log::debug!("No field named {:?}, a new one will be created", spec.name);
        return Ok(FieldPlan::New);
    };

    if found.field_type.as_deref() != Some("Sig") {
        return Err(Error::InvalidInput(format!("field {:?} is not a signature field", spec.name)));
    }
    if found.dict.contains_key("V") {
        return Err(Error::InvalidInput(format!("signature field {:?} is already signed", spec.name)));
    }

    log::debug!("Reusing signature field {:?} ({})", spec.name, found.reference);
    Ok(FieldPlan::Existing {
        reference: found.reference,
        dict: found.dict,
    })
}

/// Attach `sig_ref` according to `plan`, queueing every modified object.
///
/// Changes to the catalog are made on `catalog`; the caller writes it.
pub fn apply_field(
    doc: &mut PdfDocument,
    plan: FieldPlan,
    spec: &SigFieldSpec,
    sig_ref: ObjectRef,
    update: &mut IncrementalUpdate,
    catalog: &mut Dictionary,
) -> Result<ObjectRef> {
    let field_ref = match plan {
        FieldPlan::Existing { reference, mut dict } => {
            dict.insert("V".to_string(), Object::Reference(sig_ref));
            update.put(reference, Object::Dictionary(dict));
            reference
        },
        FieldPlan::New => {
            let field_ref = update.allocate();
            let (page_ref, mut page) = doc.first_page()?;

            let mut widget = Dictionary::new();
            widget.insert("Type".to_string(), Object::name("Annot"));
            widget.insert("Subtype".to_string(), Object::name("Widget"));
            widget.insert("FT".to_string(), Object::name("Sig"));
            widget.insert("T".to_string(), Object::text_string(&spec.name));
            widget.insert("V".to_string(), Object::Reference(sig_ref));
            widget.insert("F".to_string(), Object::Integer(spec.annotation_flags));
            widget.insert("Rect".to_string(), Object::Array(spec.rect.iter().map(|v| Object::Real(*v)).collect()));
            widget.insert("P".to_string(), Object::Reference(page_ref));
            update.put(field_ref, Object::Dictionary(widget));

            if append_to_array(doc, update, &mut page, "Annots", Object::Reference(field_ref))? {
                update.put(page_ref, Object::Dictionary(page));
            }
            field_ref
        },
    };

    register_in_acroform(doc, update, catalog, field_ref)?;
    Ok(field_ref)
}

/// Add the field to `/Fields` (unless already listed) and raise `/SigFlags`.
fn register_in_acroform(
    doc: &mut PdfDocument,
    update: &mut IncrementalUpdate,
    catalog: &mut Dictionary,
    field_ref: ObjectRef,
) -> Result<()> {
    let (form_ref, mut form) = match doc.acroform()? {
        Some(AcroFormLocation::Indirect(r, dict)) => (Some(r), dict),
        Some(AcroFormLocation::Inline(dict)) => (None, dict),
        None => (None, Dictionary::new()),
    };

    let listed = match form.get("Fields") {
        Some(fields) => doc
            .resolve(fields)?
            .as_array()
            .is_some_and(|arr| arr.contains(&Object::Reference(field_ref))),
        None => false,
    };
    if !listed {
        append_to_array(doc, update, &mut form, "Fields", Object::Reference(field_ref))?;
    }

    let flags = form.get("SigFlags").and_then(|o| o.as_integer()).unwrap_or(0);
    form.insert("SigFlags".to_string(), Object::Integer(flags | SIG_FLAGS));

    match form_ref {
        Some(r) => update.put(r, Object::Dictionary(form)),
        None => {
            catalog.insert("AcroForm".to_string(), Object::Dictionary(form));
        },
    }
    Ok(())
}

/// Append `item` to the array under `key`, following an indirect array.
///
/// Returns whether `container` itself changed.
fn append_to_array(
    doc: &mut PdfDocument,
    update: &mut IncrementalUpdate,
    container: &mut Dictionary,
    key: &str,
    item: Object,
) -> Result<bool> {
    match container.get_mut(key) {
        Some(Object::Reference(r)) => {
            let r = *r;
            let mut items = match doc.resolve(&Object::Reference(r))? {
                Object::Array(items) => items,
                other => {
                    return Err(Error::InvalidObjectType {
                        expected: "Array".to_string(),
                        found: other.type_name().to_string(),
                    })
                },
            };
            items.push(item);
            update.put(r, Object::Array(items));
            Ok(false)
        },
        Some(Object::Array(items)) => {
            items.push(item);
            Ok(true)
        },
        _ => {
            container.insert(key.to_string(), Object::Array(vec![item]));
            Ok(true)
        },
    }
}
