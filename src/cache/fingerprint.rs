use std::fmt;

use crate::models::RenderOptions;

/// MD5 digest of a target URL and its recognized options, used both as the
/// cache key and as the stem of the cached file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn derive(url: &str, options: &RenderOptions) -> Self {
        let mut context = md5::Context::new();
        write_field(&mut context, url);
        for (name, value) in options.iter() {
            write_field(&mut context, name);
            write_field(&mut context, value);
        }
        Self(format!("{:x}", context.compute()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("screenshot_{}.jpg", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Length prefix keeps ("ab", "c") and ("a", "bc") apart.
fn write_field(context: &mut md5::Context, field: &str) {
    context.consume(field.len().to_string().as_bytes());
    context.consume(b":");
    context.consume(field.as_bytes());
}
