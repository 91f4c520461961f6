pub mod city_resolver;
