//! Stand-ins for ffmpeg. Each script receives the real argument vector.

#![allow(dead_code)]

/// Concatenates the files listed in the manifest after `-i` into the last
/// argument.
pub const CONCAT: &str = r#"#!/bin/sh
prev=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then manifest="$arg"; fi
  prev="$arg"
  out="$arg"
done
: > "$out"
sed -n "s/^file '\(.*\)'$/\1/p" "$manifest" | while IFS= read -r f; do cat "$f" >> "$out"; done
"#;

/// Writes a diagnostic to stderr and exits nonzero.
pub const BROKEN: &str = r#"#!/bin/sh
echo "concat: Invalid data found when processing input" >&2
exit 1
"#;

/// Never finishes within a test timeout.
pub const HANGING: &str = "#!/bin/sh\nexec sleep 30\n";

/// Records its argument vector next to the output, then concatenates.
pub const RECORDING: &str = r#"#!/bin/sh
for arg in "$@"; do out="$arg"; done
printf '%s\n' "$@" > "$out.args"
prev=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then manifest="$arg"; fi
  prev="$arg"
done
cp "$manifest" "$out.manifest"
: > "$out"
sed -n "s/^file '\(.*\)'$/\1/p" "$manifest" | while IFS= read -r f; do cat "$f" >> "$out"; done
"#;
