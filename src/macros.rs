/// `doc!` is a shortcut that helps building `Document`
/// objects.
///
/// You can create a document with a value of `value1` for `field1`
/// `value2` for `field2`, as follows :
///
/// ```c
/// doc!(
///     field1 => value1,
///     field2 => value2,
/// )
/// ```
///
/// The value can be anything convertible into a
/// [`FieldValue`](crate::schema::FieldValue): a `&str`, a `String`, a `u64`, a `i64`, a `f64`,
/// a `bool`, ...
///
/// # Warning
///
/// The document hence created, is not yet validated against a schema.
/// Validation happens when the document is added to a
/// [`MemoryIndexBuilder`](crate::MemoryIndexBuilder).
///
/// # Example
///
/// ```rust
/// use sigterms::doc;
///
/// let doc = doc!(
///     "title" => "Life Aquatic",
///     "likes" => 4u64
/// );
/// assert_eq!(doc.len(), 2);
/// ```
#[macro_export]
macro_rules! doc(
    () => {
        {
            ($crate::Document::default())
        }
    }; // avoids a warning due to the useless `mut`.
    ($($field:expr => $value:expr),*) => {
        {
            let mut document = $crate::Document::default();
            $(
                document.add_field_value($field, $value);
            )*
            document
        }
    };
    // if there is a trailing comma retry with the trailing comma stripped.
    ($($field:expr => $value:expr),+ ,) => {
        doc!( $( $field => $value ), *)
    };
);
