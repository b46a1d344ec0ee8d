//! A small ArchieML reader.
//!
//! Supports `key: value` pairs with dotted keys, `{scope}` objects,
//! `[array]` blocks of objects or `* item` strings, multi-line values
//! closed by `:end`, `:skip`/`:endskip` blocks and `:ignore`.
//! Nested `[.sub]` arrays and backslash escapes are not supported.

use serde_json::{Map, Value};

/// Parse ArchieML text into a JSON object.
pub fn parse(text: &str) -> Value {
    let mut parser = Parser::default();
    for line in text.lines() {
        if !parser.line(line) {
            break;
        }
    }
    Value::Object(parser.root)
}

#[derive(Debug, Clone, Default)]
enum Scope {
    #[default]
    Root,
    Object(Vec<String>),
    Array {
        path: Vec<String>,
        first_key: Option<String>,
    },
}

#[derive(Debug, Clone)]
enum Target {
    Root,
    Object(Vec<String>),
    Element(Vec<String>, usize),
}

#[derive(Debug)]
struct Pending {
    target: Target,
    key: Vec<String>,
    value: String,
}

#[derive(Default)]
struct Parser {
    root: Map<String, Value>,
    scope: Scope,
    pending: Option<Pending>,
    buffer: Vec<String>,
    skipping: bool,
}

impl Parser {
    /// Feed one line. Returns false once `:ignore` is reached.
    fn line(&mut self, raw: &str) -> bool {
        let line = raw.trim();

        if self.skipping {
            if command(line).as_deref() == Some("endskip") {
                self.skipping = false;
            }
            return true;
        }

        if let Some(cmd) = command(line) {
            match cmd.as_str() {
                "end" => self.finish_multiline(),
                "ignore" => return false,
                "skip" => self.skipping = true,
                "endskip" => {}
                _ => {
                    self.buffer_text(raw);
                    return true;
                }
            }
            self.reset_pending();
            return true;
        }

        if let Some(inner) = bracketed(line, '{', '}') {
            self.open_object(inner);
            self.reset_pending();
            return true;
        }

        if let Some(inner) = bracketed(line, '[', ']') {
            self.open_array(inner);
            self.reset_pending();
            return true;
        }

        if let Some((key, value)) = key_value(line) {
            self.set_key(key, value);
            return true;
        }

        let listed = match (&self.scope, line.strip_prefix('*')) {
            (Scope::Array { path, .. }, Some(item)) => {
                let items = array_at(&mut self.root, path);
                if items.iter().all(Value::is_string) {
                    items.push(Value::String(item.trim().to_string()));
                }
                true
            }
            _ => false,
        };
        if listed {
            self.reset_pending();
            return true;
        }

        self.buffer_text(raw);
        true
    }

    fn buffer_text(&mut self, raw: &str) {
        if self.pending.is_some() {
            self.buffer.push(raw.to_string());
        }
    }

    fn reset_pending(&mut self) {
        self.pending = None;
        self.buffer.clear();
    }

    fn open_object(&mut self, inner: &str) {
        if inner.is_empty() {
            self.scope = Scope::Root;
            return;
        }
        let path = split_key(inner);
        object_at(&mut self.root, &path);
        self.scope = Scope::Object(path);
    }

    fn open_array(&mut self, inner: &str) {
        if inner.is_empty() {
            self.scope = Scope::Root;
            return;
        }
        let path = split_key(inner);
        array_at(&mut self.root, &path).clear();
        self.scope = Scope::Array {
            path,
            first_key: None,
        };
    }

    fn set_key(&mut self, key: &str, value: &str) {
        let key_path = split_key(key);

        let target = match &mut self.scope {
            Scope::Root => Target::Root,
            Scope::Object(path) => Target::Object(path.clone()),
            Scope::Array { path, first_key } => {
                let items = array_at(&mut self.root, path);
                if items.first().map(Value::is_string).unwrap_or(false) {
                    return;
                }
                let head = key_path[0].clone();
                let starts_item = match first_key {
                    None => {
                        *first_key = Some(head);
                        true
                    }
                    Some(first) => *first == head || items.is_empty(),
                };
                if starts_item {
                    items.push(Value::Object(Map::new()));
                }
                Target::Element(path.clone(), items.len() - 1)
            }
        };

        assign(&mut self.root, &target, &key_path, Value::String(value.to_string()));
        self.pending = Some(Pending {
            target,
            key: key_path,
            value: value.to_string(),
        });
        self.buffer.clear();
    }

    fn finish_multiline(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if self.buffer.is_empty() {
            return;
        }

        let mut value = pending.value;
        for line in &self.buffer {
            value.push('\n');
            value.push_str(line);
        }
        let value = value.trim().to_string();
        assign(&mut self.root, &pending.target, &pending.key, Value::String(value));
    }
}

/// `:word` commands, lowercased.
fn command(line: &str) -> Option<String> {
    let word = line.strip_prefix(':')?;
    if !word.is_empty() && word.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(word.to_ascii_lowercase())
    } else {
        None
    }
}

fn bracketed(line: &str, open: char, close: char) -> Option<&str> {
    let inner = line.strip_prefix(open)?.strip_suffix(close)?.trim();
    if inner.is_empty() || is_key(inner) {
        Some(inner)
    } else {
        None
    }
}

fn key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if is_key(key) {
        Some((key, value.trim()))
    } else {
        None
    }
}

fn is_key(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        })
}

fn split_key(key: &str) -> Vec<String> {
    key.split('.').map(String::from).collect()
}

fn object_at<'a>(mut map: &'a mut Map<String, Value>, path: &[String]) -> &'a mut Map<String, Value> {
    for segment in path {
        let entry = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        map = match entry {
            Value::Object(next) => next,
            _ => unreachable!("entry was just replaced with an object"),
        };
    }
    map
}

fn array_at<'a>(root: &'a mut Map<String, Value>, path: &[String]) -> &'a mut Vec<Value> {
    let (last, parents) = match path.split_last() {
        Some(split) => split,
        None => unreachable!("array paths are never empty"),
    };
    let parent = object_at(root, parents);
    let entry = parent
        .entry(last.clone())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    match entry {
        Value::Array(items) => items,
        _ => unreachable!("entry was just replaced with an array"),
    }
}

fn assign(root: &mut Map<String, Value>, target: &Target, key: &[String], value: Value) {
    let scope = match target {
        Target::Root => root,
        Target::Object(path) => object_at(root, path),
        Target::Element(path, index) => {
            let items = array_at(root, path);
            let Some(item) = items.get_mut(*index) else {
                return;
            };
            if !item.is_object() {
                *item = Value::Object(Map::new());
            }
            match item {
                Value::Object(map) => map,
                _ => unreachable!("item was just replaced with an object"),
            }
        }
    };

    let Some((last, parents)) = key.split_last() else {
        return;
    };
    object_at(scope, parents).insert(last.clone(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_values() {
        let doc = parse("title: Response times\nbyline:  Staff  \nnot a key line");
        assert_eq!(doc, json!({"title": "Response times", "byline": "Staff"}));
    }

    #[test]
    fn test_dotted_keys_and_scopes() {
        let doc = parse("meta.title: A\n{share}\ntweet: Hi\n{}\nafter: B");
        assert_eq!(
            doc,
            json!({"meta": {"title": "A"}, "share": {"tweet": "Hi"}, "after": "B"})
        );
    }

    #[test]
    fn test_object_arrays() {
        let text = "[stations]\nname: One\nminutes: 4\nname: Two\nminutes: 9\n[]\nend: yes";
        let doc = parse(text);
        assert_eq!(
            doc,
            json!({
                "stations": [
                    {"name": "One", "minutes": "4"},
                    {"name": "Two", "minutes": "9"}
                ],
                "end": "yes"
            })
        );
    }

    #[test]
    fn test_string_arrays() {
        let doc = parse("[notes]\n* first\n* second\n[]");
        assert_eq!(doc, json!({"notes": ["first", "second"]}));
    }

    #[test]
    fn test_multiline_end() {
        let doc = parse("intro: First line\nSecond line\n\nThird\n:end\nnext: x");
        assert_eq!(
            doc,
            json!({"intro": "First line\nSecond line\n\nThird", "next": "x"})
        );
    }

    #[test]
    fn test_skip_and_ignore() {
        let doc = parse("a: 1\n:skip\nb: 2\n:endskip\nc: 3\n:ignore\nd: 4");
        assert_eq!(doc, json!({"a": "1", "c": "3"}));
    }

    #[test]
    fn test_links_preserved() {
        let doc = parse("source: <a href=\"https://example.test\">Data</a>");
        assert_eq!(
            doc["source"],
            json!("<a href=\"https://example.test\">Data</a>")
        );
    }
}
