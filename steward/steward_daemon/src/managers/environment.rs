use rand::Rng;

use super::instance::FieldMap;
use super::manifest::AppManifest;

pub const DEVICE_NAME_FIELD: &str = "DEVICE_NAME";
pub const CLAIM_URL_FIELD: &str = "claimURL";
/// Requested host port of a batch deployment. Never exported to the container.
pub const HOST_PORT_FIELD: &str = "HOSTPORT";

/// Ordered container variables. Setting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    entries: Vec<(String, String)>,
}

impl Environment {
    pub fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// `KEY=VALUE` strings as passed to `docker run -e`.
    pub fn to_vars(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledEnvironment {
    pub environment: Environment,
    /// Values produced from the manifest's auto generate rules.
    pub generated: FieldMap,
    /// Every value a `$VAR` reference may resolve to.
    pub values: FieldMap,
}

/// Builds the container environment. Later steps override earlier ones:
/// static entries, generated fields, user fields, the device name and finally
/// `KEY=$VAR` placeholders that are still unset.
pub fn assemble<R: Rng>(
    manifest: &AppManifest,
    device_name: &str,
    fields: &FieldMap,
    rng: &mut R,
) -> AssembledEnvironment {
    let mut environment = Environment::default();
    for (key, value) in &manifest.environment {
        if !value.is_empty() && !value.contains('$') {
            environment.set(key, value);
        }
    }

    let generated: FieldMap = manifest
        .auto_generate
        .iter()
        .map(|(key, rule)| (key.clone(), rule.generate(rng)))
        .collect();
    for (key, value) in &generated {
        environment.set(key, value);
    }

    for (key, value) in fields {
        if is_reserved(key) || generated.contains_key(key) {
            continue;
        }
        environment.set(key, value);
    }
    environment.set(DEVICE_NAME_FIELD, device_name);

    let mut values: FieldMap = fields
        .iter()
        .filter(|(key, _)| !is_reserved(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    values.extend(generated.clone());
    values.insert(DEVICE_NAME_FIELD.to_string(), device_name.to_string());

    for (key, value) in &manifest.environment {
        if environment.contains(key) {
            continue;
        }
        if let Some(resolved) = reference(value).and_then(|variable| values.get(variable)) {
            environment.set(key, resolved);
        }
    }

    AssembledEnvironment {
        environment,
        generated,
        values,
    }
}

/// Required fields that are absent or blank. `DEVICE_NAME` is supplied separately.
pub fn missing_fields<'a>(manifest: &'a AppManifest, fields: &FieldMap) -> Vec<&'a str> {
    manifest
        .required_fields
        .iter()
        .filter(|field| field.as_str() != DEVICE_NAME_FIELD)
        .filter(|field| !manifest.auto_generate.contains_key(*field))
        .filter(|field| {
            fields
                .get(*field)
                .map_or(true, |value| value.trim().is_empty())
        })
        .map(String::as_str)
        .collect()
}

/// Splits the command template on whitespace and substitutes `$VAR` and
/// `${VAR}` occurrences. Unknown variables stay literal.
pub fn render_command(template: &str, values: &FieldMap) -> Vec<String> {
    template
        .split_whitespace()
        .map(|token| substitute(token, values))
        .collect()
}

fn substitute(token: &str, values: &FieldMap) -> String {
    let mut rendered = String::with_capacity(token.len());
    let mut rest = token;
    while let Some(start) = rest.find('$') {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let (variable, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end)
            }
        };
        match values.get(variable).filter(|_| !variable.is_empty()) {
            Some(value) => rendered.push_str(value),
            None => {
                rendered.push('$');
                rendered.push_str(&after[..consumed]);
            }
        }
        rest = &after[consumed..];
    }
    rendered.push_str(rest);
    rendered
}

fn reference(value: &str) -> Option<&str> {
    let variable = value.strip_prefix('$')?;
    let variable = variable
        .strip_prefix('{')
        .and_then(|braced| braced.strip_suffix('}'))
        .unwrap_or(variable);
    (!variable.is_empty()).then_some(variable)
}

fn is_reserved(key: &str) -> bool {
    matches!(key, DEVICE_NAME_FIELD | CLAIM_URL_FIELD | HOST_PORT_FIELD)
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::managers::manifest::AutoGenerateRule;
    use crate::utils::test_utilities::create_example_manifest;

    fn fields(entries: &[(&str, &str)]) -> FieldMap {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn assemble_seeded(manifest: &AppManifest, fields: &FieldMap) -> AssembledEnvironment {
        assemble(manifest, "box", fields, &mut StdRng::seed_from_u64(9))
    }

    #[test]
    fn static_entries_skip_references_and_empty_values() {
        let mut manifest = create_example_manifest();
        manifest.environment = fields(&[("MODE", "lite"), ("EMPTY", ""), ("TOKEN", "$TOKEN")])
            .into_iter()
            .collect();
        let assembled = assemble_seeded(&manifest, &FieldMap::new());
        assert_eq!(assembled.environment.get("MODE"), Some("lite"));
        assert!(!assembled.environment.contains("EMPTY"));
        assert!(!assembled.environment.contains("TOKEN"));
        assert_eq!(assembled.environment.get(DEVICE_NAME_FIELD), Some("box"));
    }

    #[test]
    fn user_fields_override_static_entries() {
        let mut manifest = create_example_manifest();
        manifest.environment = fields(&[("MODE", "lite")]);
        let assembled = assemble_seeded(&manifest, &fields(&[("MODE", "full")]));
        assert_eq!(assembled.environment.get("MODE"), Some("full"));
    }

    #[test]
    fn device_name_and_claim_url_fields_are_not_copied() {
        let manifest = create_example_manifest();
        let assembled = assemble_seeded(
            &manifest,
            &fields(&[
                (DEVICE_NAME_FIELD, "other"),
                (CLAIM_URL_FIELD, "https://claim"),
                (HOST_PORT_FIELD, "20000"),
            ]),
        );
        assert_eq!(assembled.environment.get(DEVICE_NAME_FIELD), Some("box"));
        assert!(!assembled.environment.contains(CLAIM_URL_FIELD));
        assert!(!assembled.environment.contains(HOST_PORT_FIELD));
    }

    #[test]
    fn generated_fields_win_over_user_values() {
        let mut manifest = create_example_manifest();
        manifest.auto_generate.insert(
            String::from("NODE_ID"),
            AutoGenerateRule {
                length: 8,
                prefix: String::from("n-"),
                charset: String::from("ab"),
            },
        );
        let assembled = assemble_seeded(&manifest, &fields(&[("NODE_ID", "user-set")]));
        let generated = assembled.generated.get("NODE_ID").unwrap();
        assert!(generated.starts_with("n-"));
        assert_eq!(assembled.environment.get("NODE_ID"), Some(generated.as_str()));
    }

    #[test]
    fn placeholders_resolve_from_final_values() {
        let mut manifest = create_example_manifest();
        manifest.environment = fields(&[
            ("CID", "$PACKETSTREAM_CID"),
            ("NAME", "${DEVICE_NAME}"),
            ("UNSET", "$NOWHERE"),
        ]);
        let assembled = assemble_seeded(&manifest, &fields(&[("PACKETSTREAM_CID", "abc")]));
        assert_eq!(assembled.environment.get("CID"), Some("abc"));
        assert_eq!(assembled.environment.get("NAME"), Some("box"));
        assert!(!assembled.environment.contains("UNSET"));
    }

    #[test]
    fn later_steps_keep_first_position() {
        let mut manifest = create_example_manifest();
        manifest.environment = fields(&[("A", "1"), ("B", "2")]);
        let assembled = assemble_seeded(&manifest, &fields(&[("A", "3")]));
        assert_eq!(
            assembled.environment.to_vars(),
            vec!["A=3", "B=2", "DEVICE_NAME=box"]
        );
    }

    #[test]
    fn missing_required_fields() {
        let mut manifest = create_example_manifest();
        manifest.required_fields = [DEVICE_NAME_FIELD, "EMAIL", "PASSWORD"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            missing_fields(&manifest, &fields(&[("EMAIL", "a@b.c"), ("PASSWORD", " ")])),
            vec!["PASSWORD"]
        );
        assert!(missing_fields(&manifest, &fields(&[("EMAIL", "a"), ("PASSWORD", "b")])).is_empty());
    }

    #[test]
    fn command_substitution() {
        let values = fields(&[("EMAIL", "a@b.c"), ("DEVICE_NAME", "box")]);
        assert_eq!(
            render_command("-email $EMAIL -device=${DEVICE_NAME} -id=id_$DEVICE_NAME", &values),
            vec!["-email", "a@b.c", "-device=box", "-id=id_box"]
        );
    }

    #[test]
    fn unknown_command_variables_stay_literal() {
        let values = fields(&[("EMAIL", "a@b.c")]);
        assert_eq!(
            render_command("run $MISSING ${ALSO} $ $EMAIL", &values),
            vec!["run", "$MISSING", "${ALSO}", "$", "a@b.c"]
        );
    }
}
