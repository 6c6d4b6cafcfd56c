use serde_json::Value;

use super::{copy_fields, fog_images, invalid, named, registry_id, spec, ParseError};

pub(super) fn catalog_item(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let spec = spec(doc)?;

    // イメージは spec 直下でも spec.images でもよい
    let images = match spec.get("images") {
        Some(Value::Object(images)) => images.clone(),
        None | Some(Value::Null) => spec.clone(),
        Some(_) => return Err(invalid("spec.images", "must be a mapping")),
    };

    let fog_images = fog_images(&images);

    if fog_images.is_empty() {
        return Err(invalid("spec.images", "requires an x86 or arm image"));
    }

    let registry = images.get("registry").or_else(|| spec.get("registry"));

    let mut payload = named(name);

    copy_fields(
        &spec,
        &mut payload,
        &[
            "description",
            "category",
            "publisher",
            "configExample",
            "diskRequired",
            "ramRequired",
            "picture",
            "isPublic",
        ],
    );

    for (key, field) in [("inputType", "spec.inputType"), ("outputType", "spec.outputType")] {
        match spec.get(key) {
            None | Some(Value::Null) => {}
            Some(value @ Value::Object(_)) => {
                payload.insert(key.into(), value.clone());
            }
            Some(_) => return Err(invalid(field, "must be a mapping")),
        }
    }

    payload.insert("images".into(), Value::Array(fog_images));
    payload.insert(
        "registryId".into(),
        registry_id(registry, "spec.registry")?,
    );

    Ok(Value::Object(payload))
}
