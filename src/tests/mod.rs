mod support;

mod test_key_scheme;
mod test_memory_limit_store;
