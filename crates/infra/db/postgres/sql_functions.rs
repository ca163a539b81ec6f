use diesel::sql_types::Timestamptz;

diesel::define_sql_function! {
    /// Later of two timestamps; keeps `updated_at` from moving backwards on upsert.
    fn greatest(a: Timestamptz, b: Timestamptz) -> Timestamptz;
}
