/// Runs a side effect on a value and passes the value on, for logging in the
/// middle of a method chain.
pub trait Also: Sized {
    fn also<F: FnOnce(&Self)>(self, f: F) -> Self {
        f(&self);
        self
    }
}

impl<T> Also for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_value_through() {
        let mut seen = None;
        let value = Ok::<_, ()>(3).also(|r| seen = Some(*r));
        assert_eq!(value, Ok(3));
        assert_eq!(seen, Some(Ok(3)));
    }
}
