use super::NormalizedSource;
use quest_common::{JsEnvironmentKind, Language};

/// Stand-ins for the browser globals learners reach for. Reads return
/// empty values; writes and dialogs are echoed to stdout.
const BROWSER_STUBS: &str = r#"// --- browser API stubs ---
const __questElement = (tag) => ({
    tagName: String(tag || "div").toUpperCase(),
    id: "",
    className: "",
    innerHTML: "",
    textContent: "",
    value: "",
    style: {},
    children: [],
    classList: { add: () => {}, remove: () => {}, toggle: () => {}, contains: () => false },
    setAttribute: () => {},
    getAttribute: () => null,
    appendChild(child) { this.children.push(child); return child; },
    removeChild: () => {},
    addEventListener: () => {},
    removeEventListener: () => {},
});
const __questStorage = (name) => {
    const items = new Map();
    return {
        getItem: (key) => (items.has(key) ? items.get(key) : null),
        setItem: (key, value) => { items.set(key, String(value)); console.log(`${name} SET: ${key} = ${value}`); },
        removeItem: (key) => { items.delete(key); console.log(`${name} REMOVE: ${key}`); },
        clear: () => items.clear(),
    };
};
const document = {
    title: "",
    body: __questElement("body"),
    head: __questElement("head"),
    getElementById: (id) => Object.assign(__questElement("div"), { id }),
    getElementsByClassName: () => [],
    getElementsByTagName: () => [],
    querySelector: () => __questElement("div"),
    querySelectorAll: () => [],
    createElement: (tag) => __questElement(tag),
    createTextNode: (text) => ({ textContent: String(text) }),
    addEventListener: () => {},
    write: (...parts) => console.log(...parts),
};
const alert = (message) => console.log("ALERT:", message);
const prompt = (message, defaultValue = "") => {
    console.log("PROMPT:", message);
    return defaultValue || "Hello, JavaScript User!";
};
const confirm = (message) => {
    console.log("CONFIRM:", message);
    return true;
};
const localStorage = __questStorage("LocalStorage");
const sessionStorage = __questStorage("SessionStorage");
const window = {
    document,
    alert,
    prompt,
    confirm,
    localStorage,
    sessionStorage,
    location: { href: "http://localhost:3000", pathname: "/" },
    addEventListener: () => {},
    removeEventListener: () => {},
    setTimeout,
    clearTimeout,
    setInterval,
    clearInterval,
};
// --- end browser API stubs ---
"#;

pub(super) fn normalize(source: &str, environment: Option<JsEnvironmentKind>) -> NormalizedSource {
    match environment {
        Some(JsEnvironmentKind::Browser) => NormalizedSource {
            language: Language::Javascript,
            code: format!("{}\n{}", BROWSER_STUBS, source),
            entry_class: None,
            rewritten: true,
        },
        _ => NormalizedSource::unchanged(Language::Javascript, source),
    }
}
