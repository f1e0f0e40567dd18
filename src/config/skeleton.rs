/// Skeleton `settings.conf` written on first run; every key shows its default.
pub const SETTINGS_SKELETON_CONTENT: &str = "# installd settings\n\
#\n\
# Format: key = value\n\
# Lines starting with #, // or ; are comments. Unknown keys are ignored.\n\
#\n\
# ---------- Server ----------\n\
# Address the HTTP API listens on\n\
bind = 127.0.0.1:7400\n\
#\n\
# When set, every request must carry `Authorization: Bearer <token>`\n\
api_token =\n\
#\n\
# ---------- Data ----------\n\
# App lists (TOML); relative paths are resolved against this directory\n\
catalog_path = catalog.toml\n\
#\n\
# Installation records: memory | file\n\
store = file\n\
store_path = installations.json\n\
#\n\
# ---------- Execution ----------\n\
# Log commands instead of running them\n\
dry_run = false\n\
#\n\
# Attempts per app and the pause between them in milliseconds\n\
# (unset: 2000, or 1000 on Windows)\n\
max_attempts = 3\n\
# retry_delay_ms = 2000\n\
#\n\
# Per-command limits\n\
command_timeout_secs = 1800\n\
max_output_bytes = 10485760\n\
#\n\
# Elevation probe timeout\n\
probe_timeout_secs = 5\n\
#\n\
# ---------- Batches ----------\n\
chunk_size = 50\n\
progress_step = 10\n\
terminal_write_attempts = 3\n";
