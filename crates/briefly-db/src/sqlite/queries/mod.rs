mod api_keys;
mod preferences;
