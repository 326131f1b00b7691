pub mod pipeline;
pub mod scanner;

/// Synthetic mod script declaring `class_name`, about `size` bytes long
///
/// References `classes` in extends, type hints, calls, strings and comments.
pub fn generate_script(class_name: &str, classes: &[&str], size: usize) -> String {
    let base = classes.first().copied().unwrap_or("Node");
    let mut content = format!("class_name {}\nextends {}\n\n", class_name, base);
    let mut i = 0;
    while content.len() < size {
        let other = classes.get(i % classes.len().max(1)).copied().unwrap_or("Node");
        content.push_str(&format!(
            "# uses {other} for step {i}\nvar field_{i}: {other} = {other}.new()\n\nfunc step_{i}(a: {other}, b: int = 2) -> {other}:\n\tprint(\"{other} step {i}\")\n\treturn field_{i}\n\n",
        ));
        i += 1;
    }
    content
}

/// `(relative_path, text)` pairs for a mod with `count` classes
pub fn generate_mod(count: usize, size: usize) -> Vec<(String, String)> {
    let names: Vec<String> = (0..count).map(|i| format!("Class{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let others: Vec<&str> = refs.iter().copied().filter(|n| *n != name.as_str()).take(4).collect();
            (format!("lib/{}/{}.gd", i % 4, name), generate_script(name, &others, size))
        })
        .collect()
}
