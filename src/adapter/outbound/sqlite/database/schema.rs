// Diesel table definitions matching migrations/.

diesel::table! {
    experiments (id) {
        id -> Integer,
        name -> Text,
        kind -> Text,
        source_a -> Text,
        source_b -> Text,
        clinical_source -> Nullable<Text>,
        cpg_platform -> Nullable<Text>,
        correlation_method -> Text,
        adjustment_method -> Text,
        min_correlation -> Double,
        min_std_dev_a -> Double,
        min_std_dev_b -> Double,
        all_vs_all -> Integer,
        result_limit -> Nullable<BigInt>,
        state -> Text,
        attempt -> Integer,
        evaluated_row_count -> Nullable<BigInt>,
        result_total_row_count -> Nullable<BigInt>,
        result_final_row_count -> Nullable<BigInt>,
        submitted_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    experiment_results (id) {
        id -> Integer,
        experiment_id -> Integer,
        gene -> Text,
        gem -> Text,
        correlation -> Double,
        p_value -> Nullable<Double>,
        adjusted_p_value -> Nullable<Double>,
    }
}

diesel::joinable!(experiment_results -> experiments (experiment_id));
diesel::allow_tables_to_appear_in_same_query!(experiments, experiment_results);
