//! Binding of submitted data to form instances

use crate::form::builder::{FormInstance, derive_defaults, log_derive_error};
use crate::form::fields::{Parsed, is_existing};
use crate::form::registry::FormRegistry;
use crate::form::value::FieldValue;
use crate::store::{ConfigDocument, EXISTING_VALUE, Storage};
use serde_json::{Map, Value};
use tracing::debug;

/// Bind the submitted body to every form instance
///
/// Fields must already hold their derived values, which become the
/// original values. Repeated instances bind the `group_N` part of the
/// body, plain instances bind the whole body.
///
/// A field submitted as the stored-secret token is derived again with the
/// other submitted values visible, so that a secret follows its domain. If
/// that still yields the token, or fails, the original value is kept.
pub fn bind_forms(
    forms: &mut [FormInstance<'_>],
    body: &Map<String, Value>,
    settings: &ConfigDocument,
    credentials: &ConfigDocument,
    storage: &Storage<'_>,
    registry: &FormRegistry,
) {
    for form in forms.iter_mut() {
        let instance_body = if form.group.cloneable {
            body.get(&form.id)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default()
        } else {
            body.clone()
        };

        let mut kept = Vec::new();
        for (index, field) in form.fields.iter_mut().enumerate() {
            field.original = field.value.clone();
            let raw = instance_body.get(field.name());
            if is_existing(raw) {
                field.value = FieldValue::text(EXISTING_VALUE);
                field.error = None;
                kept.push(index);
                continue;
            }
            let Parsed { value, error } = field.def.field.parse(raw);
            field.value = value;
            field.error = error;
        }

        if !kept.is_empty() {
            let submitted = form.values();
            let context = form.context(settings, credentials, storage, registry, Some(&submitted));
            for index in kept {
                let field = &mut form.fields[index];
                let value = match context.derive_value(field.def) {
                    Ok(value) if !value.is_existing() => value,
                    Ok(_) => field.original.clone(),
                    Err(err) => {
                        log_derive_error(&err, field.def, &form.id);
                        field.original.clone()
                    }
                };
                debug!("Kept stored value of {} in {}", field.name(), form.id);
                field.value = value;
            }
        }

        form.body = Some(instance_body);
    }
}

/// Derive every field and bind the body in one pass
pub fn derive_and_bind(
    forms: &mut [FormInstance<'_>],
    body: &Map<String, Value>,
    settings: &ConfigDocument,
    credentials: &ConfigDocument,
    storage: &Storage<'_>,
    registry: &FormRegistry,
) {
    derive_defaults(forms, settings, credentials, storage, registry);
    bind_forms(forms, body, settings, credentials, storage, registry);
}
