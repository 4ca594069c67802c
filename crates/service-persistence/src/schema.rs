// Diesel schema shared by the SQLite and Postgres backends.
// Tablas: cache, service_data, service_versions, service_releases,
// service_params, service_sequences
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    cache (key) {
        key -> Text,
        value -> Text,
        time_created -> BigInt,
        expires -> BigInt,
    }
}
diesel::table! {
    service_data (service_id) {
        service_id -> Text,
        workflow -> Text,
        meta -> Text,
        config -> Nullable<Text>,
    }
}
diesel::table! {
    service_versions (service_id, version_id) {
        service_id -> Text,
        version_id -> Text,
        version_tag -> Nullable<Text>,
        release_id -> Nullable<Text>,
        workflow -> Text,
        config -> Text,
        time_created -> BigInt,
        time_updated -> BigInt,
    }
}
diesel::table! {
    service_releases (service_id, release_id) {
        service_id -> Text,
        release_id -> Text,
        platform_id -> Text,
        version_id -> Text,
        #[sql_name = "type"]
        release_type -> Text,
        stage -> Text,
        alias -> Text,
        time_created -> BigInt,
        time_updated -> BigInt,
    }
}
diesel::table! {
    service_params (service_id, scope_type, level_type, key) {
        service_id -> Text,
        scope_type -> Text,
        level_type -> Text,
        key -> Text,
        data -> Text,
        time_created -> BigInt,
        time_updated -> BigInt,
    }
}
diesel::table! {
    service_sequences (service_id, sequence_name) {
        service_id -> Text,
        sequence_name -> Text,
        last_id -> BigInt,
    }
}
allow_tables_to_appear_in_same_query!(service_data, service_versions, service_releases, service_params, service_sequences);
